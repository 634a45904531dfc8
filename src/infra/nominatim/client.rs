use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::fetch::{HttpClient, get_json};
use crate::location::{Coordinates, DetectedLocation};
use crate::services::Geocoder;

pub const UNKNOWN_DISTRICT: &str = "Unknown district";
pub const UNKNOWN_STATE: &str = "Unknown state";
pub const CURRENT_LOCATION: &str = "Current location";

/// Address fields tried in order for each name; the first non-empty one wins.
const DISTRICT_FIELDS: &[&str] = &["state_district", "county", "district"];
const CITY_FIELDS: &[&str] = &["city", "town", "village", "suburb", "hamlet"];
const STATE_FIELDS: &[&str] = &["state"];

/// Reverse geocoder backed by the OpenStreetMap Nominatim `/reverse` API.
pub struct NominatimClient<C> {
    http: C,
    base_url: String,
}

impl<C: HttpClient> NominatimClient<C> {
    pub fn new(http: C, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> Geocoder for NominatimClient<C> {
    #[tracing::instrument(skip(self), fields(lat = at.latitude, lon = at.longitude))]
    async fn reverse(&self, at: Coordinates) -> Result<DetectedLocation> {
        let url = format!(
            "{}/reverse?format=jsonv2&lat={}&lon={}",
            self.base_url.trim_end_matches('/'),
            at.latitude,
            at.longitude
        );

        let json: Value = get_json(&self.http, &url).await?;
        let detected = detected_from_response(&json, at);
        debug!(label = %detected.label(), "Position reverse geocoded");
        Ok(detected)
    }
}

/// Extracts place names from a Nominatim `jsonv2` response, substituting
/// placeholder labels for missing fields.
pub fn detected_from_response(json: &Value, at: Coordinates) -> DetectedLocation {
    let address = &json["address"];
    let pick = |fields: &[&str], fallback: &str| {
        fields
            .iter()
            .filter_map(|f| address[*f].as_str())
            .find(|v| !v.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };

    DetectedLocation {
        city: pick(CITY_FIELDS, CURRENT_LOCATION),
        district: pick(DISTRICT_FIELDS, UNKNOWN_DISTRICT),
        state: pick(STATE_FIELDS, UNKNOWN_STATE),
        latitude: at.latitude,
        longitude: at.longitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const AT: Coordinates = Coordinates {
        latitude: 21.04,
        longitude: 75.79,
    };

    #[test]
    fn test_full_address() {
        let response = json!({
            "display_name": "Bodwad, Jalgaon, Maharashtra, India",
            "address": {
                "town": "Bodwad",
                "state_district": "Jalgaon District",
                "county": "Bodwad Taluka",
                "state": "Maharashtra",
                "country": "India"
            }
        });

        let detected = detected_from_response(&response, AT);
        assert_eq!(detected.city, "Bodwad");
        assert_eq!(detected.district, "Jalgaon District");
        assert_eq!(detected.state, "Maharashtra");
        assert_eq!(detected.coordinates(), AT);
    }

    #[test]
    fn test_field_precedence() {
        let response = json!({
            "address": {
                "suburb": "Wagholi",
                "village": "Lonikand",
                "county": "Haveli",
                "state": "Maharashtra"
            }
        });

        let detected = detected_from_response(&response, AT);
        assert_eq!(detected.city, "Lonikand");
        assert_eq!(detected.district, "Haveli");
    }

    #[test]
    fn test_missing_address_uses_placeholders() {
        let detected = detected_from_response(&json!({"error": "Unable to geocode"}), AT);
        assert_eq!(detected.city, CURRENT_LOCATION);
        assert_eq!(detected.district, UNKNOWN_DISTRICT);
        assert_eq!(detected.state, UNKNOWN_STATE);
    }

    #[test]
    fn test_empty_strings_are_skipped() {
        let response = json!({ "address": { "city": "", "town": "Khanna", "state": "" } });
        let detected = detected_from_response(&response, AT);
        assert_eq!(detected.city, "Khanna");
        assert_eq!(detected.state, UNKNOWN_STATE);
    }
}
