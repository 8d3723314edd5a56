//! api.rs
//! Rutas HTTP: /health, /parkings, /parkings/:id (+ stats y espacios),
//! limpieza de cache y utilidades de diagnóstico.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer};

use crate::resolver::ConfigResolver;
use crate::types::{count_by_status, SpaceStatus};

#[derive(Clone)]
pub struct ApiState {
    pub resolver: Arc<ConfigResolver>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/parkings", get(listar))
        .route("/parkings/:id", get(parqueadero))
        .route("/parkings/:id/stats", get(stats))
        .route("/parkings/:id/spaces/:space_id", put(actualizar_espacio))
        .route("/cache/clear", post(limpiar_cache))
        .route("/debug/endpoints", get(debug_endpoints))
        .route("/debug/sources", get(debug_fuentes))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
}

/// Query común: `?refresh=true` salta el cache de estados.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    pub refresh: Option<bool>,
}

async fn listar(State(st): State<ApiState>, Query(q): Query<RefreshQuery>) -> impl IntoResponse {
    Json(st.resolver.resumen_parqueaderos(q.refresh.unwrap_or(false)).await)
}

async fn parqueadero(
    State(st): State<ApiState>,
    Path(id): Path<String>,
    Query(q): Query<RefreshQuery>,
) -> Response {
    match st.resolver.resolve_lot_config(&id, q.refresh.unwrap_or(false)).await {
        Ok(lot) => Json(lot).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("{e:#}") })),
        )
            .into_response(),
    }
}

async fn stats(
    State(st): State<ApiState>,
    Path(id): Path<String>,
    Query(q): Query<RefreshQuery>,
) -> Response {
    match st.resolver.resolve_lot_config(&id, q.refresh.unwrap_or(false)).await {
        Ok(lot) => Json(count_by_status(&lot)).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("{e:#}") })),
        )
            .into_response(),
    }
}

/// Cuerpo del PUT de un espacio: estado nuevo y placa opcional (sólo
/// tiene efecto al reservar).
#[derive(Debug, Deserialize)]
pub struct ActualizacionEspacio {
    pub estado: SpaceStatus,
    #[serde(default)]
    pub placa: Option<String>,
}

async fn actualizar_espacio(
    State(st): State<ApiState>,
    Path((id, space_id)): Path<(String, String)>,
    Json(body): Json<ActualizacionEspacio>,
) -> impl IntoResponse {
    let ok = st
        .resolver
        .set_space_status(&id, &space_id, body.estado, body.placa.as_deref())
        .await;
    Json(json!({ "ok": ok }))
}

async fn limpiar_cache(State(st): State<ApiState>) -> impl IntoResponse {
    st.resolver.clear_cache().await;
    Json(json!({ "ok": true }))
}

async fn debug_endpoints(State(st): State<ApiState>) -> impl IntoResponse {
    Json(st.resolver.probar_endpoints().await)
}

async fn debug_fuentes(State(st): State<ApiState>) -> impl IntoResponse {
    Json(st.resolver.fuentes_de_datos().await)
}
