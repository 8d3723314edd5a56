//! Capa de datos de parqueaderos: resolución de configuración estructural
//! y estados dinámicos por espacio, con fallback a snapshots locales,
//! caches en memoria y write-back best-effort de cambios manuales.

pub mod api;
pub mod data;
pub mod fallback;
pub mod fetch;
pub mod resolver;
pub mod types;

pub use resolver::ConfigResolver;
pub use types::{AppCfg, Lot, Space, SpaceStatus, StatusSnapshot, Zone};
