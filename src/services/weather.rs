use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::location::Coordinates;

/// Current conditions at a position. A field is `None` when the provider
/// did not report it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClimateReading {
    /// Air temperature, °C.
    pub temperature: Option<f64>,
    /// Relative humidity, %.
    pub humidity: Option<f64>,
    /// Precipitation, mm.
    pub rainfall: Option<f64>,
    /// Wind speed, km/h.
    pub wind_speed: Option<f64>,
}

#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn current(&self, at: Coordinates) -> Result<ClimateReading>;
}
