//! estados.rs
//!
//! Feed de estados por punto de parqueo.
//!
//! - El endpoint habla el vocabulario externo ("desocupado", "ocupado",
//!   "reservado"); aquí se traduce al vocabulario de la app y de vuelta
//! - Un código desconocido o ausente cae a disponible: el sistema
//!   prefiere mostrar disponibilidad antes que rechazar vocabulario nuevo
//! - El recorrido secciones → subsecciones → puntos produce el mapa
//!   espacio → estado que el merge aplica sobre la estructura

use serde::Deserialize;
use std::collections::HashMap;

use crate::data::estructura::RawSeccion;
use crate::types::{ahora_iso, EstadoEspacio, SpaceStatus, StatusSnapshot};

/// Documento del endpoint de estados (misma jerarquía que la estructura
/// por secciones, con `estado` por punto y una leyenda de colores).
#[derive(Debug, Deserialize)]
pub struct EstadosDoc {
    #[serde(default)]
    pub secciones: Vec<RawSeccion>,
    #[serde(default)]
    pub estado_color: HashMap<String, String>,
}

/// Vocabulario externo → interno. Tabla fija de tres códigos; se aceptan
/// también los sinónimos en inglés que usan algunos despliegues.
pub fn mapear_estado_endpoint(codigo: &str) -> SpaceStatus {
    match codigo {
        "desocupado" | "unoccupied" => SpaceStatus::Available,
        "ocupado" | "occupied" => SpaceStatus::Occupied,
        "reservado" | "reserved" => SpaceStatus::Reserved,
        _ => SpaceStatus::Available,
    }
}

/// Interno → externo, para el write-back. Lo que no existe en el
/// vocabulario externo (mantenimiento) viaja como desocupado.
pub fn mapear_estado_a_endpoint(estado: SpaceStatus) -> &'static str {
    match estado {
        SpaceStatus::Available => "desocupado",
        SpaceStatus::Occupied => "ocupado",
        SpaceStatus::Reserved => "reservado",
        SpaceStatus::Maintenance => "desocupado",
    }
}

/// Recorre el documento de estados y construye el snapshot: un mapa
/// espacio → estado con ids canónicos, más la leyenda con sus claves
/// traducidas al vocabulario interno.
pub fn procesar_estados_doc(
    doc: &EstadosDoc,
    endpoint: &str,
    parking_id: &str,
    is_local: bool,
) -> StatusSnapshot {
    let ahora = ahora_iso();
    let mut estados = HashMap::new();
    for seccion in &doc.secciones {
        for sub in &seccion.subsecciones {
            for punto in &sub.puntos_parqueo {
                let espacio_id = format!("section_{}_sub_{}_point_{}", seccion.id, sub.id, punto.id);
                let original = punto.estado.clone().unwrap_or_default();
                estados.insert(
                    espacio_id,
                    EstadoEspacio {
                        estado: mapear_estado_endpoint(&original),
                        estado_original: original,
                        last_updated: ahora.clone(),
                        seccion_id: Some(seccion.id),
                        subseccion_id: Some(sub.id),
                        punto_id: Some(punto.id),
                    },
                );
            }
        }
    }
    let colores = doc
        .estado_color
        .iter()
        .map(|(codigo, color)| (mapear_estado_endpoint(codigo), color.clone()))
        .collect();
    StatusSnapshot {
        estados,
        colores,
        endpoint: endpoint.to_string(),
        loaded_at: ahora,
        parking_id: parking_id.to_string(),
        is_local,
    }
}
