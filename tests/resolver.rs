//! Escenarios de punta a punta del resolver sobre los snapshots
//! empaquetados en /data, con endpoints simulados en loopback cuando el
//! escenario necesita un remoto vivo.

use std::time::Duration;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use parqueo::fallback::FallbackStore;
use parqueo::resolver::ConfigResolver;
use parqueo::types::{count_by_status, AppCfg, SpaceStatus};

fn cfg_base() -> AppCfg {
    AppCfg {
        t_estructura_ms: 300,
        t_estados_ms: 300,
        t_update_ms: 300,
        ..AppCfg::default()
    }
}

fn store_empaquetado() -> FallbackStore {
    // las pruebas de integración corren desde la raíz del crate
    FallbackStore::cargar("data")
}

/// Sirve un documento JSON fijo en un puerto efímero de loopback.
async fn servidor_json(doc: Value) -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new().route(
        "/api/estructura",
        get(move || {
            let doc = doc.clone();
            async move { Json(doc) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api/estructura"), handle)
}

/// Sirve un endpoint que nunca responde dentro del deadline.
async fn servidor_lento() -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new().route(
        "/api/estructura",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "tarde"
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api/estructura"), handle)
}

#[tokio::test]
async fn estructura_remota_caida_usa_snapshot_local() {
    let mut cfg = cfg_base();
    cfg.endpoints_estructura
        .insert("sede_principal_p1".into(), "http://127.0.0.1:9/api/estructura".into());
    let resolver = ConfigResolver::new(cfg, store_empaquetado()).unwrap();

    let lot = resolver.resolve_lot_config("sede_principal_p1", false).await.unwrap();
    assert!(lot.is_local);
    assert_eq!(lot.endpoint, "local_data");
    assert_eq!(lot.id, "sede_principal_p1");
    // 2 subsecciones en la sección 1 + 1 en la sección 2
    assert_eq!(lot.zonas.len(), 3);
    assert!(lot.zonas.iter().any(|z| z.id == "section_1_sub_2"));

    // el feed local reporta ocupado para section_1_sub_1_point_1
    let espacio = lot.zonas[0]
        .espacios
        .iter()
        .find(|e| e.id == "section_1_sub_1_point_1")
        .unwrap();
    assert_eq!(espacio.estado, SpaceStatus::Occupied);
    let meta = lot.estados_meta.as_ref().unwrap();
    assert!(meta.is_local);
    assert_eq!(meta.endpoint, "local_data");
    assert_eq!(meta.colores[&SpaceStatus::Available], "#4CAF50");
}

#[tokio::test]
async fn timeout_de_estructura_cae_al_snapshot_local() {
    let (url, servidor) = servidor_lento().await;
    let mut cfg = cfg_base();
    cfg.t_estructura_ms = 150;
    cfg.endpoints_estructura.insert("sede_principal_p1".into(), url);
    let resolver = ConfigResolver::new(cfg, store_empaquetado()).unwrap();

    let lot = resolver.resolve_lot_config("sede_principal_p1", false).await.unwrap();
    assert!(lot.is_local);
    assert_eq!(lot.zonas.len(), 3);
    servidor.abort();
}

#[tokio::test]
async fn estructura_remota_elige_la_entrada_correcta_de_la_lista() {
    let doc = json!([
        { "id": "otro_lote", "nombre": "Otro", "zonas": [] },
        {
            "id": "sede_principal_p1",
            "nombre": "Sede Principal",
            "secciones": [{
                "id": 1,
                "subsecciones": [{ "id": 1, "puntos_parqueo": [{ "id": 1 }, { "id": 2 }] }]
            }]
        }
    ]);
    let (url, servidor) = servidor_json(doc).await;
    let mut cfg = cfg_base();
    cfg.endpoints_estructura.insert("sede_principal_p1".into(), url.clone());
    let resolver = ConfigResolver::new(cfg, store_empaquetado()).unwrap();

    let lot = resolver.resolve_lot_config("sede_principal_p1", false).await.unwrap();
    assert!(!lot.is_local);
    assert_eq!(lot.endpoint, url);
    assert_eq!(lot.id, "sede_principal_p1");
    assert_eq!(lot.zonas.len(), 1);
    assert_eq!(lot.zonas[0].espacios.len(), 2);
    servidor.abort();
}

#[tokio::test]
async fn configuracion_canonica_pasa_sin_cambios() {
    let resolver = ConfigResolver::new(cfg_base(), store_empaquetado()).unwrap();
    let lot = resolver.resolve_lot_config("parqueadero_medicina_p1", false).await.unwrap();

    assert!(lot.is_local);
    assert_eq!(lot.zonas.len(), 2);
    assert!(lot.secciones_originales.is_none());
    // sin feed de estados para medicina: los estados autorados se conservan
    assert!(lot.estados_meta.is_none());
    let stats = count_by_status(&lot);
    assert_eq!(stats.total, 7);
    assert_eq!(stats.available, 4);
    assert_eq!(stats.occupied, 1);
    assert_eq!(stats.reserved, 1);
    assert_eq!(stats.maintenance, 1);

    let b02 = lot.zonas[1].espacios.iter().find(|e| e.id == "B02").unwrap();
    assert!(b02.poligono.is_some());
    assert!(b02.posicion.is_none());
}

#[tokio::test]
async fn lectura_despues_de_escritura_sin_force_refresh() {
    let mut cfg = cfg_base();
    // endpoint de estados configurado pero inalcanzable: la primera
    // resolución cae al snapshot local y lo cachea
    cfg.endpoints_estados
        .insert("sede_principal_p1".into(), "http://127.0.0.1:9/api/estados/central".into());
    let resolver = ConfigResolver::new(cfg, store_empaquetado()).unwrap();

    resolver.resolve_lot_config("sede_principal_p1", false).await.unwrap();
    let ok = resolver
        .set_space_status("sede_principal_p1", "section_1_sub_1_point_3", SpaceStatus::Reserved, Some("ABC123"))
        .await;
    assert!(ok);

    // sin force_refresh el cache de estados manda y refleja la mutación
    let lot = resolver.resolve_lot_config("sede_principal_p1", false).await.unwrap();
    let espacio = lot
        .zonas
        .iter()
        .flat_map(|z| &z.espacios)
        .find(|e| e.id == "section_1_sub_1_point_3")
        .unwrap();
    assert_eq!(espacio.estado, SpaceStatus::Reserved);
}

#[tokio::test]
async fn salir_de_reservado_limpia_la_placa() {
    let resolver = ConfigResolver::new(cfg_base(), store_empaquetado()).unwrap();
    resolver.resolve_lot_config("parqueadero_medicina_p1", false).await.unwrap();

    resolver
        .set_space_status("parqueadero_medicina_p1", "B01", SpaceStatus::Reserved, Some("XYZ789"))
        .await;
    let lot = resolver.config_en_cache("parqueadero_medicina_p1").await.unwrap();
    let b01 = lot.zonas[1].espacios.iter().find(|e| e.id == "B01").unwrap();
    assert_eq!(b01.estado, SpaceStatus::Reserved);
    assert_eq!(b01.placa.as_deref(), Some("XYZ789"));

    resolver
        .set_space_status("parqueadero_medicina_p1", "B01", SpaceStatus::Available, None)
        .await;
    let lot = resolver.config_en_cache("parqueadero_medicina_p1").await.unwrap();
    let b01 = lot.zonas[1].espacios.iter().find(|e| e.id == "B01").unwrap();
    assert_eq!(b01.estado, SpaceStatus::Available);
    assert!(b01.placa.is_none());
}

#[tokio::test]
async fn los_alias_comparten_una_sola_entrada_de_cache() {
    let resolver = ConfigResolver::new(cfg_base(), store_empaquetado()).unwrap();
    let lot = resolver.resolve_lot_config("sede_central_p1", false).await.unwrap();
    assert_eq!(lot.id, "sede_principal_p1");
    // el cache queda bajo el id canónico, visible desde cualquier alias
    assert!(resolver.config_en_cache("sede_principal_p1").await.is_some());
    assert!(resolver.config_en_cache("sede_central_p1").await.is_some());
}

#[tokio::test]
async fn lote_fantasma_se_omite_sin_fallar() {
    let resolver = ConfigResolver::new(cfg_base(), store_empaquetado()).unwrap();
    assert!(resolver.resolve_lot_config("ghost", false).await.is_err());

    let lots = resolver.resolve_all_lots(false).await;
    assert_eq!(lots.len(), 2);
    assert!(!lots.iter().any(|l| l.id == "ghost"));

    // sin snapshots ni endpoints no queda ningún candidato, y tampoco es un error
    let vacio = ConfigResolver::new(cfg_base(), FallbackStore::default()).unwrap();
    assert!(vacio.resolve_all_lots(false).await.is_empty());
}

#[tokio::test]
async fn cache_anejo_como_ultimo_recurso() {
    let doc = json!({
        "id": "sede_principal_p1",
        "nombre": "Sede Principal",
        "zonas": [{ "id": "z1", "nombre": "Z1", "espacios": [{ "id": "A01" }] }]
    });
    let (url, servidor) = servidor_json(doc).await;
    let mut cfg = cfg_base();
    cfg.endpoints_estructura.insert("sede_principal_p1".into(), url);
    // sin snapshot local: el remoto es la única fuente primaria
    let resolver = ConfigResolver::new(cfg, FallbackStore::default()).unwrap();

    let lot = resolver.resolve_lot_config("sede_principal_p1", false).await.unwrap();
    assert!(!lot.is_local);

    // el endpoint muere; la copia cacheada sigue sirviendo
    servidor.abort();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let anejo = resolver.resolve_lot_config("sede_principal_p1", true).await.unwrap();
    assert_eq!(anejo.id, "sede_principal_p1");
    assert_eq!(anejo.zonas.len(), 1);
}

#[tokio::test]
async fn clear_cache_vacia_ambos_mapas() {
    let resolver = ConfigResolver::new(cfg_base(), store_empaquetado()).unwrap();
    resolver.resolve_lot_config("sede_principal_p1", false).await.unwrap();
    assert!(resolver.config_en_cache("sede_principal_p1").await.is_some());
    resolver.clear_cache().await;
    assert!(resolver.config_en_cache("sede_principal_p1").await.is_none());

    let resumen = resolver.resumen_parqueaderos(false).await;
    assert_eq!(resumen.len(), 2);
    let central = resumen.iter().find(|r| r.id == "sede_principal_p1").unwrap();
    assert!(central.is_local);
    assert_eq!(central.estructura, "secciones");
    assert!(central.total_espacios > 0);
}

#[tokio::test]
async fn resumen_conserva_contadores_coherentes() {
    let resolver = ConfigResolver::new(cfg_base(), store_empaquetado()).unwrap();
    let resumen = resolver.resumen_parqueaderos(false).await;
    let medicina = resumen.iter().find(|r| r.id == "parqueadero_medicina_p1").unwrap();
    assert_eq!(
        medicina.total_espacios,
        medicina.disponibles + medicina.ocupados + medicina.reservados + medicina.mantenimiento
    );
    assert_eq!(medicina.estructura, "zonas");
    assert_eq!(medicina.estados_endpoint, "No configurado");
}
