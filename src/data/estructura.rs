//! estructura.rs
//!
//! Documentos estructurales de parqueadero.
//!
//! - El backend puede servir la forma canónica (zonas → espacios) o la
//!   forma por secciones (secciones → subsecciones → puntos_parqueo)
//! - `normalizar` resuelve la forma una sola vez a la forma canónica;
//!   el resto del código nunca vuelve a preguntar por la forma
//! - Los estados reales los aplica el merge después; aquí todo espacio
//!   sintetizado nace disponible

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::types::{Dimensiones, Lot, Posicion, Space, SpaceStatus, Zone};

/// Documento estructural crudo, clasificado una sola vez en la frontera
/// de ingestión.
#[derive(Debug)]
pub enum RawLotDoc {
    Canonical(CanonicalDoc),
    Secciones(SeccionesDoc),
    /// Ni zonas ni secciones: se devuelve tal cual y valida aparte.
    Suelto(Value),
}

#[derive(Debug, Deserialize)]
pub struct CanonicalDoc {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(alias = "zones")]
    pub zonas: Vec<Zone>,
}

#[derive(Debug, Deserialize)]
pub struct SeccionesDoc {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub descripcion: Option<String>,
    pub secciones: Vec<RawSeccion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSeccion {
    pub id: i64,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub acronimo: Option<String>,
    #[serde(default)]
    pub subsecciones: Vec<RawSubseccion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSubseccion {
    pub id: i64,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub posicion: Option<Posicion>,
    #[serde(default)]
    pub dimensiones: Option<Dimensiones>,
    #[serde(default)]
    pub estilo: Option<Value>,
    #[serde(default)]
    pub puntos_parqueo: Vec<RawPunto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPunto {
    pub id: i64,
    #[serde(default)]
    pub posicion: Option<Posicion>,
    #[serde(default)]
    pub dimensiones: Option<Dimensiones>,
    #[serde(default)]
    pub poligono: Option<Vec<f64>>,
    #[serde(default)]
    pub tipo: Option<String>,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub estilo: Option<Value>,
    /// Sólo lo usa el feed de estados; la estructura lo ignora.
    #[serde(default)]
    pub estado: Option<String>,
}

fn clasificar(doc: &Value) -> RawLotDoc {
    let tiene = |campo: &str| doc.get(campo).map_or(false, Value::is_array);
    if tiene("zonas") || tiene("zones") {
        match serde_json::from_value::<CanonicalDoc>(doc.clone()) {
            Ok(c) => return RawLotDoc::Canonical(c),
            Err(e) => warn!("Documento canónico ilegible: {e}"),
        }
    } else if tiene("secciones") {
        match serde_json::from_value::<SeccionesDoc>(doc.clone()) {
            Ok(s) => return RawLotDoc::Secciones(s),
            Err(e) => warn!("Documento de secciones ilegible: {e}"),
        }
    }
    RawLotDoc::Suelto(doc.clone())
}

/// Normaliza un documento estructural a la forma canónica. Nunca falla:
/// sobre un documento ya canónico es la identidad, y un documento sin
/// forma reconocible pasa de largo para que `validar_minimo` lo rechace.
pub fn normalizar(doc: Value) -> Lot {
    match clasificar(&doc) {
        RawLotDoc::Canonical(c) => Lot {
            id: c.id.unwrap_or_default(),
            nombre: c.nombre.unwrap_or_default(),
            descripcion: c.descripcion,
            zonas: c.zonas,
            ..Lot::default()
        },
        RawLotDoc::Secciones(s) => {
            let zonas: Vec<Zone> = s
                .secciones
                .iter()
                .flat_map(|sec| sec.subsecciones.iter().map(move |sub| zona_desde_subseccion(sec, sub)))
                .collect();
            info!("Convertidas {} secciones en {} zonas", s.secciones.len(), zonas.len());
            Lot {
                id: s.id.unwrap_or_default(),
                nombre: s.nombre.unwrap_or_default(),
                descripcion: s.descripcion,
                zonas,
                // se conservan sólo para trazabilidad, nunca se consultan
                secciones_originales: doc.get("secciones").cloned(),
                ..Lot::default()
            }
        }
        RawLotDoc::Suelto(v) => Lot {
            id: texto(&v, "id"),
            nombre: texto(&v, "nombre"),
            descripcion: v.get("descripcion").and_then(Value::as_str).map(str::to_string),
            ..Lot::default()
        },
    }
}

fn texto(doc: &Value, campo: &str) -> String {
    doc.get(campo).and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Validación mínima: el documento debe aportar al menos id o nombre;
/// el que falte se deriva del otro.
pub fn validar_minimo(config: &mut Lot) -> bool {
    if config.id.is_empty() && config.nombre.is_empty() {
        return false;
    }
    if config.nombre.is_empty() {
        config.nombre = config.id.clone();
    }
    if config.id.is_empty() {
        config.id = config
            .nombre
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
    }
    true
}

fn zona_desde_subseccion(seccion: &RawSeccion, sub: &RawSubseccion) -> Zone {
    let n = sub.puntos_parqueo.len().max(1);
    let nombre_seccion = seccion
        .nombre
        .clone()
        .unwrap_or_else(|| format!("Sección {}", seccion.id));
    let nombre_sub = sub
        .nombre
        .clone()
        .unwrap_or_else(|| format!("Subsección {}", sub.id));
    // auto-layout en rejilla cuando la subsección no trae geometría propia
    let posicion = sub.posicion.unwrap_or(Posicion {
        x: ((seccion.id - 1) * 300 + (sub.id - 1) * 150 + 50) as f64,
        y: ((seccion.id - 1) * 200 + (sub.id - 1) * 120 + 50) as f64,
    });
    let dimensiones = sub.dimensiones.unwrap_or(Dimensiones {
        width: (n.min(4) * 50 + 20) as f64,
        height: (n.div_ceil(4) * 45 + 20) as f64,
    });
    let espacios = sub
        .puntos_parqueo
        .iter()
        .enumerate()
        .map(|(i, punto)| espacio_desde_punto(seccion, sub, punto, i))
        .collect();
    Zone {
        id: format!("section_{}_sub_{}", seccion.id, sub.id),
        nombre: format!("{nombre_seccion} - {nombre_sub}"),
        descripcion: sub.descripcion.clone().or_else(|| seccion.descripcion.clone()),
        posicion: Some(posicion),
        dimensiones: Some(dimensiones),
        estilo: Some(sub.estilo.clone().unwrap_or_else(|| {
            json!({ "fill": "rgba(255, 193, 7, 0.1)", "stroke": "#FFC107", "strokeWidth": 3 })
        })),
        espacios,
        seccion_id: Some(seccion.id),
        seccion_nombre: Some(nombre_seccion),
        seccion_acronimo: Some(
            seccion
                .acronimo
                .clone()
                .unwrap_or_else(|| format!("S{}", seccion.id)),
        ),
        subseccion_id: Some(sub.id),
    }
}

fn espacio_desde_punto(seccion: &RawSeccion, sub: &RawSubseccion, punto: &RawPunto, idx: usize) -> Space {
    // rejilla de 4 columnas a paso 50×45 con margen de 10px
    let por_fila = sub.puntos_parqueo.len().clamp(1, 4);
    let fila = idx / por_fila;
    let columna = idx % por_fila;
    // polígono plano x/y; mínimo 4 números = 2 puntos
    let poligono = punto
        .poligono
        .clone()
        .filter(|p| p.len() >= 4 && p.len() % 2 == 0);
    let (posicion, dimensiones) = if poligono.is_some() {
        (None, None)
    } else {
        (
            Some(punto.posicion.unwrap_or(Posicion {
                x: (columna * 50 + 10) as f64,
                y: (fila * 45 + 10) as f64,
            })),
            Some(punto.dimensiones.unwrap_or(Dimensiones { width: 45.0, height: 35.0 })),
        )
    };
    Space {
        id: format!("section_{}_sub_{}_point_{}", seccion.id, sub.id, punto.id),
        posicion,
        dimensiones,
        poligono,
        // el estado real lo aplica el merge con el snapshot de estados
        estado: SpaceStatus::Available,
        tipo: punto.tipo.clone().unwrap_or_else(|| "regular".into()),
        descripcion: punto.descripcion.clone(),
        estilo: Some(punto.estilo.clone().unwrap_or_else(|| {
            json!({ "stroke": "#ffffff", "strokeWidth": 2, "rx": 3 })
        })),
        last_updated: None,
        estado_original: None,
        placa: None,
        punto_id: Some(punto.id),
        seccion_id: Some(seccion.id),
        subseccion_id: Some(sub.id),
    }
}
