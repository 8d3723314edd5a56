use anyhow::Result;
use std::{env, sync::Arc};
use tokio::signal;
use tracing::{info, Level};

use parqueo::api::{self, ApiState};
use parqueo::fallback::FallbackStore;
use parqueo::resolver::ConfigResolver;
use parqueo::types::AppCfg;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs
    tracing_subscriber::fmt().with_env_filter("info").with_max_level(Level::INFO).init();

    // Config desde env
    let app_cfg = app_cfg_desde_env();

    info!("Cargando snapshots locales desde {}", app_cfg.data_dir);
    let fallback = FallbackStore::cargar(&app_cfg.data_dir);

    let resolver = Arc::new(ConfigResolver::new(app_cfg.clone(), fallback)?);

    // Precarga: deja el cache caliente antes de atender peticiones
    let precargados = resolver.resolve_all_lots(false).await;
    info!("{} parqueaderos precargados", precargados.len());

    // API
    let app = api::router(ApiState { resolver });
    info!("Escuchando en http://{}", app_cfg.bind);
    let listener = tokio::net::TcpListener::bind(&app_cfg.bind).await?;
    let serve = axum::serve(listener, app);
    tokio::select! {
        r = serve => { r?; },
        _ = signal::ctrl_c() => { info!("Señal de salida recibida"); }
    }

    Ok(())
}

fn app_cfg_desde_env() -> AppCfg {
    let mut c = AppCfg::default();
    if let Ok(v) = env::var("BIND") { c.bind = v; }
    if let Ok(v) = env::var("DATA_DIR") { c.data_dir = v; }
    if let Ok(v) = env::var("URL_ESTRUCTURA_CENTRAL") {
        c.endpoints_estructura.insert("sede_principal_p1".into(), v);
    }
    if let Ok(v) = env::var("URL_ESTRUCTURA_MEDICINA") {
        c.endpoints_estructura.insert("parqueadero_medicina_p1".into(), v);
    }
    if let Ok(v) = env::var("URL_ESTADOS_CENTRAL") {
        c.endpoints_estados.insert("sede_principal_p1".into(), v);
    }
    if let Ok(v) = env::var("T_ESTRUCTURA_MS") { c.t_estructura_ms = v.parse().unwrap_or(c.t_estructura_ms); }
    if let Ok(v) = env::var("T_ESTADOS_MS") { c.t_estados_ms = v.parse().unwrap_or(c.t_estados_ms); }
    if let Ok(v) = env::var("T_UPDATE_MS") { c.t_update_ms = v.parse().unwrap_or(c.t_update_ms); }
    c
}
