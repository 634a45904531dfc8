use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::fetch::{HttpClient, get_json};
use crate::location::Coordinates;
use crate::services::{ClimateReading, WeatherApi};

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,precipitation,wind_speed_10m";

/// Current-conditions client for the Open-Meteo forecast API.
pub struct OpenMeteoClient<C> {
    http: C,
    base_url: String,
}

impl<C: HttpClient> OpenMeteoClient<C> {
    pub fn new(http: C, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> WeatherApi for OpenMeteoClient<C> {
    #[tracing::instrument(skip(self), fields(lat = at.latitude, lon = at.longitude))]
    async fn current(&self, at: Coordinates) -> Result<ClimateReading> {
        let url = format!(
            "{}/v1/forecast?latitude={}&longitude={}&current={}",
            self.base_url.trim_end_matches('/'),
            at.latitude,
            at.longitude,
            CURRENT_FIELDS
        );

        let json: Value = get_json(&self.http, &url).await?;
        let reading = reading_from_response(&json);
        debug!(?reading, "Current weather received");
        Ok(reading)
    }
}

/// Reads the `current` block of a forecast response. Missing or
/// non-numeric values come back as `None`.
pub fn reading_from_response(json: &Value) -> ClimateReading {
    let current = &json["current"];
    ClimateReading {
        temperature: current["temperature_2m"].as_f64(),
        humidity: current["relative_humidity_2m"].as_f64(),
        rainfall: current["precipitation"].as_f64(),
        wind_speed: current["wind_speed_10m"].as_f64(),
    }
}
