//! Adapters for the traits in `crate::services` and for session storage.

pub mod nominatim;
pub mod open_meteo;
pub mod position;
pub mod session;
