//! types.rs
//! Modelos de datos compartidos por el servicio: configuración canónica
//! (parqueadero → zonas → espacios), snapshots de estados dinámicos,
//! estadísticas y configuración de la aplicación.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Estado interno de un espacio de parqueo. El vocabulario externo del
/// feed de estados ("desocupado", "ocupado", ...) se traduce en
/// `data::estados`; aquí sólo vive el vocabulario de la app.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpaceStatus {
    #[default]
    #[serde(rename = "available", alias = "disponible")]
    Available,
    #[serde(rename = "occupied", alias = "ocupado")]
    Occupied,
    #[serde(rename = "reserved", alias = "reservado")]
    Reserved,
    #[serde(rename = "maintenance", alias = "mantenimiento")]
    Maintenance,
}

impl SpaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpaceStatus::Available => "available",
            SpaceStatus::Occupied => "occupied",
            SpaceStatus::Reserved => "reserved",
            SpaceStatus::Maintenance => "maintenance",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Posicion {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensiones {
    pub width: f64,
    pub height: f64,
}

/// Un espacio de parqueo dentro de una zona. La geometría es un rectángulo
/// (posicion + dimensiones) o un polígono plano de pares x/y; el normalizador
/// garantiza que sólo una de las dos formas queda poblada.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posicion: Option<Posicion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensiones: Option<Dimensiones>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poligono: Option<Vec<f64>>,
    #[serde(default)]
    pub estado: SpaceStatus,
    #[serde(default = "tipo_regular")]
    pub tipo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estilo: Option<Value>,
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(rename = "_estadoOriginal", default, skip_serializing_if = "Option::is_none")]
    pub estado_original: Option<String>,
    /// Placa del vehículo; sólo tiene sentido mientras el espacio está reservado.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placa: Option<String>,
    // Referencias débiles al punto de origen cuando la zona fue sintetizada
    // desde secciones; sirven para búsquedas, nunca implican propiedad.
    #[serde(rename = "_puntoId", default, skip_serializing_if = "Option::is_none")]
    pub punto_id: Option<i64>,
    #[serde(rename = "_seccionId", default, skip_serializing_if = "Option::is_none")]
    pub seccion_id: Option<i64>,
    #[serde(rename = "_subseccionId", default, skip_serializing_if = "Option::is_none")]
    pub subseccion_id: Option<i64>,
}

fn tipo_regular() -> String {
    "regular".into()
}

/// Zona de un parqueadero: autorada directamente en forma canónica o
/// sintetizada desde un par (sección, subsección).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posicion: Option<Posicion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensiones: Option<Dimensiones>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estilo: Option<Value>,
    #[serde(default)]
    pub espacios: Vec<Space>,
    #[serde(rename = "_seccionId", default, skip_serializing_if = "Option::is_none")]
    pub seccion_id: Option<i64>,
    #[serde(rename = "_seccionNombre", default, skip_serializing_if = "Option::is_none")]
    pub seccion_nombre: Option<String>,
    #[serde(rename = "_seccionAcronimo", default, skip_serializing_if = "Option::is_none")]
    pub seccion_acronimo: Option<String>,
    #[serde(rename = "_subseccionId", default, skip_serializing_if = "Option::is_none")]
    pub subseccion_id: Option<i64>,
}

/// Metadatos del merge de estados sobre una configuración estructural.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstadosMeta {
    pub endpoint: String,
    #[serde(rename = "loadedAt")]
    pub loaded_at: String,
    #[serde(rename = "totalStates")]
    pub total_states: usize,
    #[serde(default)]
    pub colores: HashMap<SpaceStatus, String>,
    #[serde(rename = "isLocal")]
    pub is_local: bool,
}

/// Un parqueadero completo en forma canónica, con procedencia.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub zonas: Vec<Zone>,
    /// URL de origen, o "local_data" si vino del snapshot empaquetado.
    #[serde(rename = "_endpoint", default)]
    pub endpoint: String,
    #[serde(rename = "_isLocal", default)]
    pub is_local: bool,
    #[serde(rename = "_loadedAt", default)]
    pub loaded_at: String,
    #[serde(rename = "_estados", default, skip_serializing_if = "Option::is_none")]
    pub estados_meta: Option<EstadosMeta>,
    /// Secciones originales del documento fuente, sólo para trazabilidad.
    #[serde(rename = "_secciones_originales", default, skip_serializing_if = "Option::is_none")]
    pub secciones_originales: Option<Value>,
}

/// Estado reportado para un espacio puntual dentro de un snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstadoEspacio {
    pub estado: SpaceStatus,
    #[serde(rename = "estadoOriginal", default)]
    pub estado_original: String,
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: String,
    #[serde(rename = "seccionId", default, skip_serializing_if = "Option::is_none")]
    pub seccion_id: Option<i64>,
    #[serde(rename = "subseccionId", default, skip_serializing_if = "Option::is_none")]
    pub subseccion_id: Option<i64>,
    #[serde(rename = "puntoId", default, skip_serializing_if = "Option::is_none")]
    pub punto_id: Option<i64>,
}

/// Resultado de una carga de estados: mapa espacio → estado, leyenda de
/// colores y procedencia. Independiente de la estructura.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub estados: HashMap<String, EstadoEspacio>,
    #[serde(default)]
    pub colores: HashMap<SpaceStatus, String>,
    #[serde(rename = "_endpoint")]
    pub endpoint: String,
    #[serde(rename = "_loadedAt")]
    pub loaded_at: String,
    #[serde(rename = "_parkingId")]
    pub parking_id: String,
    #[serde(rename = "_isLocal")]
    pub is_local: bool,
}

/// Conteo de espacios por estado; un fold puro sobre todas las zonas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParkingStats {
    pub total: usize,
    pub available: usize,
    pub occupied: usize,
    pub reserved: usize,
    pub maintenance: usize,
    pub other: usize,
}

pub fn count_by_status(lot: &Lot) -> ParkingStats {
    let mut stats = ParkingStats::default();
    for zona in &lot.zonas {
        for espacio in &zona.espacios {
            stats.total += 1;
            match espacio.estado {
                SpaceStatus::Available => stats.available += 1,
                SpaceStatus::Occupied => stats.occupied += 1,
                SpaceStatus::Reserved => stats.reserved += 1,
                SpaceStatus::Maintenance => stats.maintenance += 1,
            }
        }
    }
    stats
}

/// Resumen de un parqueadero para el listado general.
#[derive(Clone, Debug, Serialize)]
pub struct ResumenParqueadero {
    pub id: String,
    pub nombre: String,
    pub descripcion: String,
    #[serde(rename = "totalEspacios")]
    pub total_espacios: usize,
    pub disponibles: usize,
    pub ocupados: usize,
    pub reservados: usize,
    pub mantenimiento: usize,
    pub endpoint: String,
    #[serde(rename = "estadosEndpoint")]
    pub estados_endpoint: String,
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
    pub estructura: String,
    #[serde(rename = "isLocal")]
    pub is_local: bool,
    #[serde(rename = "estadosLocales")]
    pub estados_locales: bool,
}

/// Resultado de la prueba de conectividad de un endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct EndpointProbe {
    pub online: bool,
    pub tipo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

/// Procedencia de los datos de un parqueadero en los caches.
#[derive(Clone, Debug, Serialize)]
pub struct FuenteInfo {
    pub source: String,
    pub endpoint: String,
    #[serde(rename = "loadedAt")]
    pub loaded_at: String,
    pub available: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct FuentesParqueadero {
    pub config: FuenteInfo,
    pub estados: FuenteInfo,
}

#[derive(Clone, Debug)]
pub struct AppCfg {
    pub bind: String,
    /// Directorio de snapshots locales empaquetados.
    pub data_dir: String,
    /// Endpoints estructurales por id canónico de parqueadero.
    pub endpoints_estructura: HashMap<String, String>,
    /// Endpoints de estados por id canónico; no todos los parqueaderos
    /// tienen feed de estados en vivo.
    pub endpoints_estados: HashMap<String, String>,
    pub t_estructura_ms: u64,
    pub t_estados_ms: u64,
    pub t_update_ms: u64,
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            data_dir: "data".into(),
            endpoints_estructura: HashMap::new(),
            endpoints_estados: HashMap::new(),
            t_estructura_ms: 1000,
            t_estados_ms: 2000,
            t_update_ms: 1000,
        }
    }
}

/// Timestamp UTC en RFC 3339, usado en toda la procedencia.
pub fn ahora_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
