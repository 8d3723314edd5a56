//! Parsers de los documentos remotos: estructura canónica o por
//! secciones, y feed de estados por punto de parqueo.

pub mod estados;
pub mod estructura;
