//! fallback.rs
//! Snapshots locales empaquetados: una estructura (`<id>.json`) y un
//! documento de estados (`<id>_states.json`) por parqueadero conocido,
//! cargados una sola vez al arrancar. La ausencia de un archivo se tolera.

use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Clone, Debug, Default)]
pub struct FallbackStore {
    configs: HashMap<String, Value>,
    estados: HashMap<String, Value>,
}

impl FallbackStore {
    /// Lee todos los `.json` del directorio de datos. Un directorio
    /// ausente deja el store vacío: el servicio sigue funcionando sólo
    /// con endpoints remotos.
    pub fn cargar(dir: &str) -> Self {
        let mut store = Self::default();
        let entradas = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!("No se pudo leer el directorio de datos {dir}: {e}");
                return store;
            }
        };
        for entrada in entradas.flatten() {
            let ruta = entrada.path();
            if ruta.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            store.cargar_archivo(&ruta);
        }
        info!(
            "Snapshots locales: {} estructuras, {} estados",
            store.configs.len(),
            store.estados.len()
        );
        store
    }

    fn cargar_archivo(&mut self, ruta: &Path) {
        let Some(stem) = ruta.file_stem().and_then(|s| s.to_str()) else {
            return;
        };
        let doc: Value = match std::fs::read_to_string(ruta)
            .map_err(anyhow::Error::from)
            .and_then(|texto| Ok(serde_json::from_str(&texto)?))
        {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Snapshot local inválido {}: {e}", ruta.display());
                return;
            }
        };
        if let Some(lot) = stem.strip_suffix("_states") {
            self.estados.insert(lot.to_string(), doc);
        } else {
            self.configs.insert(stem.to_string(), doc);
        }
    }

    pub fn config(&self, parking_id: &str) -> Option<&Value> {
        self.configs.get(parking_id)
    }

    pub fn estados(&self, parking_id: &str) -> Option<&Value> {
        self.estados.get(parking_id)
    }

    pub fn ids_con_config(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    pub fn insertar_config(&mut self, parking_id: &str, doc: Value) {
        self.configs.insert(parking_id.to_string(), doc);
    }

    pub fn insertar_estados(&mut self, parking_id: &str, doc: Value) {
        self.estados.insert(parking_id.to_string(), doc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn carga_estructuras_y_estados_por_sufijo() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("p1.json"),
            serde_json::to_string(&json!({"id": "p1", "zonas": []})).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("p1_states.json"),
            serde_json::to_string(&json!({"secciones": []})).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("roto.json"), "{ no es json").unwrap();
        std::fs::write(dir.path().join("nota.txt"), "ignorado").unwrap();

        let store = FallbackStore::cargar(dir.path().to_str().unwrap());
        assert!(store.config("p1").is_some());
        assert!(store.estados("p1").is_some());
        assert!(store.config("roto").is_none());
        assert_eq!(store.ids_con_config().count(), 1);
    }

    #[test]
    fn directorio_ausente_deja_store_vacio() {
        let store = FallbackStore::cargar("/no/existe/en/absoluto");
        assert!(store.config("p1").is_none());
    }
}
