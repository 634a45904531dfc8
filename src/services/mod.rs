//! Traits for the external collaborators of location sync.
//!
//! [`PositionSource`] reports where the device is, [`Geocoder`] names that
//! position and [`WeatherApi`] reports current conditions there. Concrete
//! adapters live under `crate::infra`.

pub mod geocoder;
pub mod position;
pub mod weather;

pub use geocoder::Geocoder;
pub use position::{PositionError, PositionSource};
pub use weather::{ClimateReading, WeatherApi};
