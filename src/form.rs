//! Prediction form state: crop, climate inputs and the cascading
//! state/district/city/village selection.
//!
//! Inputs are kept as typed text, the way a user enters them, and only
//! turned into numbers by [`PredictionForm::validate`].

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::api::types::PredictionRequest;
use crate::location::{
    Coordinates, DEFAULT_LOCATION, LocationHierarchy, LocationOptions, ReconciledLocation,
};
use crate::risk::{self, RiskAssessment, round_half_up};
use crate::services::ClimateReading;

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        let known: Vec<_> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        format!("unknown value '{s}' (expected one of: {})", known.join(", "))
                    })
            }
        }
    };
}

text_enum!(CropType {
    Wheat => "wheat",
    Rice => "rice",
    Cotton => "cotton",
    Maize => "maize",
    Soybean => "soybean",
});

text_enum!(CropStage {
    Seedling => "seedling",
    Vegetative => "vegetative",
    Flowering => "flowering",
    Fruiting => "fruiting",
    Harvesting => "harvesting",
});

/// Form fields that can carry a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Temperature,
    Humidity,
    Rainfall,
    WindSpeed,
    SoilMoisture,
    State,
    District,
    City,
    Village,
}

impl Field {
    /// Accepted range for numeric fields.
    pub fn range(&self) -> Option<(f64, f64)> {
        match self {
            Field::Temperature => Some((0.0, 60.0)),
            Field::Humidity => Some((0.0, 100.0)),
            Field::Rainfall => Some((0.0, 500.0)),
            Field::WindSpeed => Some((0.0, 150.0)),
            Field::SoilMoisture => Some((0.0, 100.0)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::Rainfall => "rainfall",
            Field::WindSpeed => "wind speed",
            Field::SoilMoisture => "soil moisture",
            Field::State => "state",
            Field::District => "district",
            Field::City => "city",
            Field::Village => "village",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("required")]
    Required,
    #[error("must be a number")]
    NotANumber,
    #[error("must be between {min} and {max}")]
    OutOfRange { min: f64, max: f64 },
    #[error("not in the location dataset")]
    NotInDataset,
}

/// Per-field errors from [`PredictionForm::validate`]. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldErrors(pub BTreeMap<Field, FieldError>);

impl FieldErrors {
    pub fn get(&self, field: Field) -> Option<&FieldError> {
        self.0.get(&field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocationSelection {
    pub state: String,
    pub district: String,
    pub city: String,
    pub village: String,
}

impl LocationSelection {
    pub fn label(&self) -> String {
        format!("{}, {}, {}, {}", self.village, self.city, self.district, self.state)
    }

    fn default_site() -> Self {
        Self {
            state: DEFAULT_LOCATION.state.to_string(),
            district: DEFAULT_LOCATION.district.to_string(),
            city: DEFAULT_LOCATION.city.to_string(),
            village: DEFAULT_LOCATION.village.to_string(),
        }
    }
}

/// The detected-location badge shown while "use current location" is on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationBadge {
    pub label: String,
    pub coordinates: Coordinates,
    /// Why the detected position was not used, if it was not.
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherStatus {
    pub auto_filled: bool,
    pub notice: Option<String>,
}

/// Validated, numeric view of a submitted form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedPrediction {
    pub crop_type: CropType,
    pub crop_stage: CropStage,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub wind_speed: f64,
    pub soil_moisture: f64,
    pub location: LocationSelection,
    pub location_label: String,
    pub date: NaiveDate,
}

/// Local stand-in for the remote model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MockPrediction {
    #[serde(flatten)]
    pub assessment: RiskAssessment,
    pub pest: &'static str,
    pub action: &'static str,
}

impl ValidatedPrediction {
    pub fn mock_result(&self) -> MockPrediction {
        let assessment = risk::assess(self.humidity, self.rainfall, self.soil_moisture);
        MockPrediction {
            assessment,
            pest: assessment.risk.pest_hint(),
            action: assessment.risk.recommended_action(),
        }
    }

    pub fn to_request(&self) -> PredictionRequest {
        PredictionRequest {
            crop_type: self.crop_type.to_string(),
            crop_stage: self.crop_stage.to_string(),
            state: self.location.state.clone(),
            district: self.location.district.clone(),
            city: self.location.city.clone(),
            village: self.location.village.clone(),
            temperature: self.temperature,
            humidity: self.humidity,
            rainfall: self.rainfall,
            wind_speed: self.wind_speed,
            soil_moisture: self.soil_moisture,
            prediction_date: self.date,
        }
    }
}

pub struct PredictionForm {
    hierarchy: Arc<LocationHierarchy>,
    pub crop_type: CropType,
    pub crop_stage: CropStage,
    pub date: NaiveDate,
    inputs: BTreeMap<Field, String>,
    selection: LocationSelection,
    use_current_location: bool,
    auto_synced: bool,
    badge: LocationBadge,
    weather: WeatherStatus,
}

impl PredictionForm {
    pub fn new(hierarchy: Arc<LocationHierarchy>) -> Self {
        let mut form = Self {
            hierarchy,
            crop_type: CropType::Rice,
            crop_stage: CropStage::Vegetative,
            date: Utc::now().date_naive(),
            inputs: BTreeMap::new(),
            selection: LocationSelection::default_site(),
            use_current_location: true,
            auto_synced: true,
            badge: LocationBadge {
                label: DEFAULT_LOCATION.label(),
                coordinates: DEFAULT_LOCATION.coordinates(),
                notice: None,
            },
            weather: WeatherStatus::default(),
        };
        form.cascade();
        form
    }

    pub fn input(&self, field: Field) -> &str {
        self.inputs.get(&field).map(String::as_str).unwrap_or("")
    }

    /// Sets a numeric input as typed.
    pub fn set_input(&mut self, field: Field, value: impl Into<String>) {
        self.inputs.insert(field, value.into());
    }

    pub fn selection(&self) -> &LocationSelection {
        &self.selection
    }

    pub fn uses_current_location(&self) -> bool {
        self.use_current_location
    }

    pub fn is_auto_synced(&self) -> bool {
        self.auto_synced
    }

    pub fn badge(&self) -> &LocationBadge {
        &self.badge
    }

    pub fn weather(&self) -> &WeatherStatus {
        &self.weather
    }

    pub fn options(&self) -> LocationOptions {
        self.hierarchy.options(
            &self.selection.state,
            &self.selection.district,
            &self.selection.city,
        )
    }

    /// Manual location entry is locked while an auto-synced detected
    /// location is in use.
    pub fn manual_location_locked(&self) -> bool {
        self.use_current_location && self.auto_synced
    }

    pub fn set_use_current_location(&mut self, enabled: bool) {
        self.use_current_location = enabled;
        if !enabled {
            self.auto_synced = false;
        }
    }

    pub fn select_state(&mut self, state: impl Into<String>) {
        self.selection.state = state.into();
        self.cascade();
    }

    pub fn select_district(&mut self, district: impl Into<String>) {
        self.selection.district = district.into();
        self.cascade();
    }

    pub fn select_city(&mut self, city: impl Into<String>) {
        self.selection.city = city.into();
        self.cascade();
    }

    pub fn select_village(&mut self, village: impl Into<String>) {
        self.selection.village = village.into();
        self.cascade();
    }

    /// Selects a location typed by name rather than picked from the
    /// option lists. The first level that is blank or not listed under its
    /// parent is reported and the selection is left unchanged.
    pub fn enter_location(
        &mut self,
        state: &str,
        district: &str,
        city: &str,
        village: &str,
    ) -> Result<(), FieldErrors> {
        let h = &self.hierarchy;
        let levels = [
            (Field::State, state, h.state(state).is_some()),
            (Field::District, district, h.district(state, district).is_some()),
            (Field::City, city, h.city(state, district, city).is_some()),
            (Field::Village, village, h.contains(state, district, city, village)),
        ];

        if let Some((field, value, _)) = levels.into_iter().find(|(_, _, known)| !known) {
            let error = if value.trim().is_empty() {
                FieldError::Required
            } else {
                FieldError::NotInDataset
            };
            debug!(%field, value, "Location name rejected");
            return Err(FieldErrors(BTreeMap::from([(field, error)])));
        }

        self.selection = LocationSelection {
            state: state.to_string(),
            district: district.to_string(),
            city: city.to_string(),
            village: village.to_string(),
        };
        self.cascade();
        Ok(())
    }

    /// Re-seeds every level below an invalid choice with the first option
    /// of its list, or empty when the list is empty. The state itself is
    /// never replaced.
    fn cascade(&mut self) {
        let h = &self.hierarchy;
        let sel = &mut self.selection;

        let districts = h
            .state(&sel.state)
            .map(|s| s.district_names())
            .unwrap_or_default();
        reseed(&mut sel.district, &districts);

        let cities = h
            .district(&sel.state, &sel.district)
            .map(|d| d.city_names())
            .unwrap_or_default();
        reseed(&mut sel.city, &cities);

        let villages: Vec<&str> = h
            .city(&sel.state, &sel.district, &sel.city)
            .map(|c| c.villages.iter().map(String::as_str).collect())
            .unwrap_or_default();
        reseed(&mut sel.village, &villages);
    }

    /// Applies the outcome of a location sync.
    ///
    /// A match fills the selection and locks it. Otherwise the resolved
    /// state (if any) is kept, the finer levels are re-seeded from the
    /// dataset and manual correction is required.
    pub fn apply_location(
        &mut self,
        label: String,
        coordinates: Coordinates,
        reconciled: &ReconciledLocation,
        notice: Option<String>,
    ) {
        self.badge = LocationBadge {
            label,
            coordinates,
            notice,
        };

        match reconciled {
            ReconciledLocation::Matched {
                state,
                district,
                city,
                village,
            } => {
                self.auto_synced = true;
                self.selection = LocationSelection {
                    state: state.clone(),
                    district: district.clone(),
                    city: city.clone(),
                    village: village.clone(),
                };
            }
            ReconciledLocation::Unmatched { state } => {
                self.auto_synced = false;
                if let Some(state) = state {
                    self.selection.state = state.clone();
                }
                self.selection.district.clear();
                self.selection.city.clear();
                self.selection.village.clear();
            }
        }
        self.cascade();
        debug!(auto_synced = self.auto_synced, selection = ?self.selection, "Location applied");
    }

    /// Fills climate inputs from a weather reading, rounding each value.
    /// Inputs the reading leaves out are left as they are.
    pub fn apply_climate(&mut self, reading: &ClimateReading) {
        let pairs = [
            (Field::Temperature, reading.temperature),
            (Field::Humidity, reading.humidity),
            (Field::Rainfall, reading.rainfall),
            (Field::WindSpeed, reading.wind_speed),
        ];
        for (field, value) in pairs {
            if let Some(v) = value {
                self.set_input(field, format!("{}", round_half_up(v)));
            }
        }
        self.weather = WeatherStatus {
            auto_filled: true,
            notice: None,
        };
    }

    /// Clears the weather-fed inputs after a failed lookup.
    pub fn weather_failed(&mut self, notice: String) {
        for field in [
            Field::Temperature,
            Field::Humidity,
            Field::Rainfall,
            Field::WindSpeed,
        ] {
            self.inputs.remove(&field);
        }
        self.weather = WeatherStatus {
            auto_filled: false,
            notice: Some(notice),
        };
    }

    pub fn validate(&self) -> Result<ValidatedPrediction, FieldErrors> {
        let mut errors = BTreeMap::new();

        let mut number = |field: Field| -> f64 {
            match parse_in_range(field, self.input(field)) {
                Ok(v) => v,
                Err(e) => {
                    errors.insert(field, e);
                    f64::NAN
                }
            }
        };

        let temperature = number(Field::Temperature);
        let humidity = number(Field::Humidity);
        let rainfall = number(Field::Rainfall);
        let wind_speed = number(Field::WindSpeed);
        let soil_moisture = number(Field::SoilMoisture);

        if !self.manual_location_locked() {
            let sel = &self.selection;
            for (field, value) in [
                (Field::State, &sel.state),
                (Field::District, &sel.district),
                (Field::City, &sel.city),
                (Field::Village, &sel.village),
            ] {
                if value.trim().is_empty() {
                    errors.insert(field, FieldError::Required);
                }
            }
        }

        if !errors.is_empty() {
            return Err(FieldErrors(errors));
        }

        let location_label = if self.use_current_location {
            self.badge.label.clone()
        } else {
            self.selection.label()
        };

        Ok(ValidatedPrediction {
            crop_type: self.crop_type,
            crop_stage: self.crop_stage,
            temperature,
            humidity,
            rainfall,
            wind_speed,
            soil_moisture,
            location: self.selection.clone(),
            location_label,
            date: self.date,
        })
    }
}

fn reseed(current: &mut String, options: &[&str]) {
    if !options.iter().any(|o| *o == current.as_str()) {
        *current = options.first().map(|o| o.to_string()).unwrap_or_default();
    }
}

fn parse_in_range(field: Field, raw: &str) -> Result<f64, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FieldError::Required);
    }

    let value: f64 = raw.parse().map_err(|_| FieldError::NotANumber)?;
    if !value.is_finite() {
        return Err(FieldError::NotANumber);
    }

    match field.range() {
        Some((min, max)) if value < min || value > max => Err(FieldError::OutOfRange { min, max }),
        _ => Ok(value),
    }
}
