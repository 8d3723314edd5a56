//! resolver.rs
//!
//! Orquestación de la configuración de parqueaderos.
//!
//! - Resuelve estructura y estados en paralelo, cada uno con su propia
//!   cadena de fallback (remoto → snapshot local → cache añejo)
//! - Hace el merge de estados sobre la estructura por id de espacio
//! - Es el único dueño de los dos caches en memoria (configuraciones
//!   completas y snapshots de estados)
//! - Aplica cambios de estado manuales: cache primero, write-back
//!   remoto best-effort después

use anyhow::{anyhow, bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::data::estados::{
    mapear_estado_a_endpoint, procesar_estados_doc, EstadosDoc,
};
use crate::data::estructura::{normalizar, validar_minimo};
use crate::fallback::FallbackStore;
use crate::fetch;
use crate::types::{
    ahora_iso, count_by_status, AppCfg, EndpointProbe, EstadoEspacio, EstadosMeta, FuenteInfo,
    FuentesParqueadero, Lot, ResumenParqueadero, SpaceStatus, StatusSnapshot,
};

/// Varios identificadores externos denotan el mismo parqueadero físico;
/// esta tabla fija los colapsa a un id canónico antes de cualquier
/// búsqueda de endpoint, snapshot o cache.
const PRIMARY_PARKING_IDS: &[(&str, &str)] = &[
    ("sede_principal_p1", "sede_principal_p1"),
    ("sede_central_p1", "sede_principal_p1"),
    ("parqueadero_medicina_p1", "parqueadero_medicina_p1"),
    ("medicina_p1", "parqueadero_medicina_p1"),
];

pub fn primary_parking_id(parking_id: &str) -> &str {
    PRIMARY_PARKING_IDS
        .iter()
        .find(|(alias, _)| *alias == parking_id)
        .map_or(parking_id, |(_, primario)| *primario)
}

/// Forma canónica de los ids de espacio derivados de secciones.
static PATRON_ESPACIO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^section_(\d+)_sub_(\d+)_point_(\d+)$").unwrap());

pub struct ConfigResolver {
    cfg: AppCfg,
    client: Client,
    fallback: FallbackStore,
    configs: RwLock<HashMap<String, Lot>>,
    estados: RwLock<HashMap<String, StatusSnapshot>>,
}

impl ConfigResolver {
    pub fn new(cfg: AppCfg, fallback: FallbackStore) -> Result<Self> {
        let client = Client::builder().brotli(true).gzip(true).deflate(true).build()?;
        Ok(Self {
            cfg,
            client,
            fallback,
            configs: RwLock::new(HashMap::new()),
            estados: RwLock::new(HashMap::new()),
        })
    }

    /// Configuración completa de un parqueadero: estructura + estados,
    /// mergeados y cacheados. Falla sólo cuando no hay dato en ninguna
    /// parte (ni remoto, ni snapshot local, ni cache).
    pub async fn resolve_lot_config(&self, parking_id: &str, force_refresh: bool) -> Result<Lot> {
        let parking_id = primary_parking_id(parking_id);

        let resultado = async {
            // dominios de fallo independientes, resueltos en paralelo
            let (estructura, estados) = tokio::join!(
                self.resolver_estructura(parking_id),
                self.resolver_estados(parking_id, force_refresh),
            );
            let estructura = estructura?;
            let completo = merge_config_estados(estructura, estados.as_ref());
            self.configs
                .write()
                .await
                .insert(parking_id.to_string(), completo.clone());
            Ok::<Lot, anyhow::Error>(completo)
        }
        .await;

        match resultado {
            Ok(lot) => {
                info!(
                    "Configuración completa para {parking_id}: {} zonas, {} espacios",
                    lot.zonas.len(),
                    count_by_status(&lot).total
                );
                Ok(lot)
            }
            Err(e) => {
                // último recurso: la copia cacheada, aunque esté añeja
                if let Some(lot) = self.configs.read().await.get(parking_id) {
                    warn!("Usando configuración de cache para {parking_id}: {e:#}");
                    return Ok(lot.clone());
                }
                Err(e)
            }
        }
    }

    /// Cadena estructural: endpoint remoto bajo deadline; si falla y hay
    /// snapshot local, se normaliza y usa; si tampoco hay, el parqueadero
    /// se reporta ausente (jamás se sustituye por datos de otro lote).
    async fn resolver_estructura(&self, parking_id: &str) -> Result<Lot> {
        let local = self.fallback.config(parking_id);
        let endpoint = self.cfg.endpoints_estructura.get(parking_id);
        if local.is_none() && endpoint.is_some() {
            warn!("Sin snapshot local para {parking_id}; se omitirá si el endpoint falla");
        }

        let remoto = match endpoint {
            Some(url) => self.fetch_estructura(url, parking_id).await,
            None => Err(anyhow!("Sin endpoint estructural configurado para {parking_id}")),
        };
        match remoto {
            Ok(lot) => Ok(lot),
            Err(e) => {
                if endpoint.is_some() {
                    warn!("Estructura remota falló para {parking_id}: {e:#}");
                }
                let Some(doc) = local else {
                    bail!("Sin endpoint ni snapshot local para {parking_id}");
                };
                let mut lot = normalizar(doc.clone());
                if lot.id.is_empty() {
                    lot.id = parking_id.to_string();
                }
                if !validar_minimo(&mut lot) {
                    bail!("Snapshot local inválido para {parking_id}");
                }
                lot.endpoint = "local_data".into();
                lot.is_local = true;
                lot.loaded_at = ahora_iso();
                info!("Estructura local para {parking_id}");
                Ok(lot)
            }
        }
    }

    async fn fetch_estructura(&self, url: &str, parking_id: &str) -> Result<Lot> {
        let bytes = fetch::get_con_deadline(&self.client, url, self.cfg.t_estructura_ms).await?;
        let data: Value = serde_json::from_slice(&bytes)?;
        // la respuesta puede ser una lista de parqueaderos o un objeto suelto
        let doc = match data {
            Value::Array(items) => {
                if items.is_empty() {
                    bail!("Respuesta estructural vacía de {url}");
                }
                let idx = items
                    .iter()
                    .position(|p| p.get("id").and_then(Value::as_str) == Some(parking_id))
                    .unwrap_or(0);
                items.into_iter().nth(idx).unwrap()
            }
            v @ Value::Object(_) => v,
            _ => bail!("Respuesta estructural inesperada de {url}"),
        };
        let mut lot = normalizar(doc);
        if lot.id.is_empty() {
            lot.id = parking_id.to_string();
        }
        if !validar_minimo(&mut lot) {
            bail!("Configuración estructural inválida de {url}");
        }
        lot.endpoint = url.to_string();
        lot.is_local = false;
        lot.loaded_at = ahora_iso();
        Ok(lot)
    }

    /// Cadena de estados: sin endpoint configurado va directo al snapshot
    /// local (no es un error); con endpoint, el cache manda salvo
    /// force_refresh; y cualquier fallo remoto cae al snapshot local.
    /// La ausencia total de estados tampoco es fatal.
    async fn resolver_estados(&self, parking_id: &str, force_refresh: bool) -> Option<StatusSnapshot> {
        let Some(endpoint) = self.cfg.endpoints_estados.get(parking_id) else {
            debug!("Sin endpoint de estados para {parking_id}, usando datos locales");
            return self.estados_locales(parking_id).await;
        };
        if !force_refresh {
            if let Some(snapshot) = self.estados.read().await.get(parking_id) {
                debug!("Estados de cache para {parking_id}");
                return Some(snapshot.clone());
            }
        }
        match self.fetch_estados(endpoint, parking_id).await {
            Ok(snapshot) => {
                self.estados
                    .write()
                    .await
                    .insert(parking_id.to_string(), snapshot.clone());
                info!(
                    "Estados remotos para {parking_id}: {} espacios",
                    snapshot.estados.len()
                );
                Some(snapshot)
            }
            Err(e) => {
                warn!("Estados remotos fallaron para {parking_id} ({endpoint}): {e:#}");
                self.estados_locales(parking_id).await
            }
        }
    }

    async fn fetch_estados(&self, endpoint: &str, parking_id: &str) -> Result<StatusSnapshot> {
        let bytes = fetch::get_con_deadline(&self.client, endpoint, self.cfg.t_estados_ms).await?;
        let doc: EstadosDoc = serde_json::from_slice(&bytes)?;
        Ok(procesar_estados_doc(&doc, endpoint, parking_id, false))
    }

    async fn estados_locales(&self, parking_id: &str) -> Option<StatusSnapshot> {
        let doc = self.fallback.estados(parking_id)?;
        let doc: EstadosDoc = match serde_json::from_value(doc.clone()) {
            Ok(d) => d,
            Err(e) => {
                warn!("Estados locales inválidos para {parking_id}: {e}");
                return None;
            }
        };
        let snapshot = procesar_estados_doc(&doc, "local_data", parking_id, true);
        self.estados
            .write()
            .await
            .insert(parking_id.to_string(), snapshot.clone());
        debug!(
            "Estados locales para {parking_id}: {} espacios",
            snapshot.estados.len()
        );
        Some(snapshot)
    }

    /// Ids canónicos conocidos: la tabla de alias más lo que aporten la
    /// configuración de endpoints y los snapshots locales, en orden estable.
    fn ids_canonicos(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for (_, primario) in PRIMARY_PARKING_IDS {
            if !ids.iter().any(|i| i == primario) {
                ids.push((*primario).to_string());
            }
        }
        let mut extras: Vec<String> = self
            .cfg
            .endpoints_estructura
            .keys()
            .map(|k| primary_parking_id(k).to_string())
            .chain(self.fallback.ids_con_config().map(|k| primary_parking_id(k).to_string()))
            .filter(|id| !ids.contains(id))
            .collect();
        extras.sort();
        extras.dedup();
        ids.extend(extras);
        ids
    }

    /// Resuelve todos los parqueaderos conocidos, uno a la vez para
    /// acotar las llamadas salientes simultáneas. El fallo de un lote no
    /// aborta el resto.
    pub async fn resolve_all_lots(&self, force_refresh: bool) -> Vec<Lot> {
        let disponibles: Vec<String> = self
            .ids_canonicos()
            .into_iter()
            .filter(|id| {
                let ok = self.cfg.endpoints_estructura.contains_key(id)
                    || self.fallback.config(id).is_some();
                if !ok {
                    warn!("Omitiendo {id}: sin snapshot local ni endpoint");
                }
                ok
            })
            .collect();

        let mut lots = Vec::new();
        for id in &disponibles {
            match self.resolve_lot_config(id, force_refresh).await {
                Ok(lot) => lots.push(lot),
                Err(e) => warn!("Error cargando {id}: {e:#}"),
            }
        }
        info!("{} parqueaderos cargados", lots.len());
        lots
    }

    /// Listado con estadísticas para el selector de parqueaderos.
    pub async fn resumen_parqueaderos(&self, force_refresh: bool) -> Vec<ResumenParqueadero> {
        self.resolve_all_lots(force_refresh)
            .await
            .iter()
            .map(resumen_de)
            .collect()
    }

    /// Cambio manual de estado de un espacio. El cache local se actualiza
    /// de forma síncrona y es autoritativo; la propagación remota es un
    /// efecto best-effort sin reintentos. Devuelve true en cuanto el
    /// cache quedó consistente, pase lo que pase con el write-back.
    pub async fn set_space_status(
        &self,
        parking_id: &str,
        space_id: &str,
        nuevo_estado: SpaceStatus,
        placa: Option<&str>,
    ) -> bool {
        let parking_id = primary_parking_id(parking_id);
        info!("Actualizando {space_id} a {} en {parking_id}", nuevo_estado.as_str());

        // los espacios de autor libre (ids fuera del patrón canónico) no
        // tienen coordenadas de sección: se omite sólo el write-back
        let captura = PATRON_ESPACIO.captures(space_id);
        if captura.is_none() {
            warn!("Formato de espacio no reconocido: {space_id}");
        }
        let estado_endpoint = mapear_estado_a_endpoint(nuevo_estado);

        let snapshot_local = self
            .estados
            .read()
            .await
            .get(parking_id)
            .map(|s| s.is_local)
            .unwrap_or(false);
        match (self.cfg.endpoints_estados.get(parking_id), captura.as_ref(), snapshot_local) {
            (Some(endpoint), Some(cap), false) => {
                let update_url = url_actualizacion(endpoint, &cap[1], &cap[2], &cap[3]);
                let body = serde_json::json!({
                    "estado": estado_endpoint,
                    "timestamp": ahora_iso(),
                });
                match fetch::put_json_con_deadline(&self.client, &update_url, &body, self.cfg.t_update_ms).await
                {
                    Ok(_) => info!("Estado actualizado en API: {update_url}"),
                    Err(e) => warn!("Actualización remota falló para {space_id}: {e:#}"),
                }
            }
            (_, _, true) => debug!("Snapshot local para {parking_id}: sin actualización remota"),
            _ => {}
        }

        let ahora = ahora_iso();
        {
            let mut estados = self.estados.write().await;
            if let Some(snapshot) = estados.get_mut(parking_id) {
                let (s, ss, p) = captura
                    .as_ref()
                    .map(|c| {
                        (
                            c[1].parse::<i64>().ok(),
                            c[2].parse::<i64>().ok(),
                            c[3].parse::<i64>().ok(),
                        )
                    })
                    .unwrap_or((None, None, None));
                snapshot.estados.insert(
                    space_id.to_string(),
                    EstadoEspacio {
                        estado: nuevo_estado,
                        estado_original: estado_endpoint.to_string(),
                        last_updated: ahora.clone(),
                        seccion_id: s,
                        subseccion_id: ss,
                        punto_id: p,
                    },
                );
            }
        }
        {
            let mut configs = self.configs.write().await;
            if let Some(config) = configs.get_mut(parking_id) {
                'zonas: for zona in &mut config.zonas {
                    if let Some(espacio) = zona.espacios.iter_mut().find(|e| e.id == space_id) {
                        espacio.estado = nuevo_estado;
                        espacio.last_updated = Some(ahora.clone());
                        espacio.estado_original = Some(estado_endpoint.to_string());
                        if nuevo_estado == SpaceStatus::Reserved {
                            if let Some(p) = placa {
                                espacio.placa = Some(p.to_string());
                            }
                        } else {
                            // la placa sólo acompaña a una reserva
                            espacio.placa = None;
                        }
                        break 'zonas;
                    }
                }
            }
        }
        true
    }

    /// Prueba de conectividad de todos los endpoints configurados,
    /// secuencial y deduplicada.
    pub async fn probar_endpoints(&self) -> HashMap<String, EndpointProbe> {
        let mut pendientes: Vec<(String, &str)> = Vec::new();
        for url in self.cfg.endpoints_estructura.values() {
            if !pendientes.iter().any(|(u, _)| u == url) {
                pendientes.push((url.clone(), "structural"));
            }
        }
        for url in self.cfg.endpoints_estados.values() {
            if !pendientes.iter().any(|(u, _)| u == url) {
                pendientes.push((url.clone(), "states"));
            }
        }
        let mut resultados = HashMap::new();
        for (url, tipo) in pendientes {
            let r = fetch::get_con_deadline(&self.client, &url, self.cfg.t_estructura_ms).await;
            let probe = EndpointProbe {
                online: r.is_ok(),
                tipo: tipo.to_string(),
                error: r.err().map(|e| format!("{e:#}")),
                timestamp: ahora_iso(),
            };
            info!("{url}: {} [{tipo}]", if probe.online { "ONLINE" } else { "OFFLINE" });
            resultados.insert(url, probe);
        }
        resultados
    }

    /// Procedencia actual de los datos por parqueadero, según los caches.
    pub async fn fuentes_de_datos(&self) -> HashMap<String, FuentesParqueadero> {
        let configs = self.configs.read().await;
        let estados = self.estados.read().await;
        let mut fuentes = HashMap::new();
        for (id, config) in configs.iter() {
            let snapshot = estados.get(id);
            fuentes.insert(
                id.clone(),
                FuentesParqueadero {
                    config: FuenteInfo {
                        source: (if config.is_local { "local_data" } else { "endpoint" }).into(),
                        endpoint: config.endpoint.clone(),
                        loaded_at: config.loaded_at.clone(),
                        available: true,
                    },
                    estados: FuenteInfo {
                        source: snapshot
                            .map(|s| if s.is_local { "local_data" } else { "endpoint" })
                            .unwrap_or("no cargado")
                            .into(),
                        endpoint: snapshot.map(|s| s.endpoint.clone()).unwrap_or_default(),
                        loaded_at: snapshot.map(|s| s.loaded_at.clone()).unwrap_or_default(),
                        available: snapshot.is_some(),
                    },
                },
            );
        }
        fuentes
    }

    /// Copia de la configuración cacheada, si existe. Útil para
    /// introspección sin disparar una resolución.
    pub async fn config_en_cache(&self, parking_id: &str) -> Option<Lot> {
        self.configs
            .read()
            .await
            .get(primary_parking_id(parking_id))
            .cloned()
    }

    /// Invalida ambos caches por completo.
    pub async fn clear_cache(&self) {
        self.configs.write().await.clear();
        self.estados.write().await.clear();
        info!("Caches de configuraciones y estados limpiados");
    }
}

/// Merge de un snapshot de estados sobre la estructura, por id exacto de
/// espacio. Un espacio sin entrada en el feed conserva su estado por
/// defecto: las configuraciones pueden definir espacios que el feed aún
/// no reporta. Idempotente para un mismo snapshot.
pub fn merge_config_estados(mut config: Lot, estados: Option<&StatusSnapshot>) -> Lot {
    let Some(snapshot) = estados else {
        return config;
    };
    let mut actualizados = 0usize;
    for zona in &mut config.zonas {
        for espacio in &mut zona.espacios {
            if let Some(info) = snapshot.estados.get(&espacio.id) {
                espacio.estado = info.estado;
                espacio.last_updated = Some(info.last_updated.clone());
                espacio.estado_original = Some(info.estado_original.clone());
                actualizados += 1;
            }
        }
    }
    debug!(
        "{actualizados} espacios actualizados con estados de {}",
        if snapshot.is_local { "archivo local" } else { "endpoint" }
    );
    config.estados_meta = Some(EstadosMeta {
        endpoint: snapshot.endpoint.clone(),
        loaded_at: snapshot.loaded_at.clone(),
        total_states: snapshot.estados.len(),
        colores: snapshot.colores.clone(),
        is_local: snapshot.is_local,
    });
    config
}

/// URL de write-back: se sustituye el segmento de estados por el de
/// actualización y se agregan las coordenadas del punto.
fn url_actualizacion(endpoint: &str, seccion: &str, subseccion: &str, punto: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        endpoint.replace("/estados/", "/update/"),
        seccion,
        subseccion,
        punto
    )
}

fn resumen_de(lot: &Lot) -> ResumenParqueadero {
    let stats = count_by_status(lot);
    ResumenParqueadero {
        id: lot.id.clone(),
        nombre: if lot.nombre.is_empty() { lot.id.clone() } else { lot.nombre.clone() },
        descripcion: lot
            .descripcion
            .clone()
            .unwrap_or_else(|| "Parqueadero disponible".into()),
        total_espacios: stats.total,
        disponibles: stats.available,
        ocupados: stats.occupied,
        reservados: stats.reserved,
        mantenimiento: stats.maintenance,
        endpoint: lot.endpoint.clone(),
        estados_endpoint: lot
            .estados_meta
            .as_ref()
            .map(|m| m.endpoint.clone())
            .unwrap_or_else(|| "No configurado".into()),
        last_updated: lot.loaded_at.clone(),
        estructura: (if lot.secciones_originales.is_some() { "secciones" } else { "zonas" }).into(),
        is_local: lot.is_local,
        estados_locales: lot.estados_meta.as_ref().map(|m| m.is_local).unwrap_or(false),
    }
}
