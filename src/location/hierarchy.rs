//! Static administrative dataset: state → district → city → villages.
//!
//! Stored on disk as nested JSON objects whose key order is significant:
//! ```json
//! {
//!   "Maharashtra": {
//!     "Jalgaon": {
//!       "Bodwad": ["Salshingi", "Shelwad"]
//!     }
//!   }
//! }
//! ```
//! The first key at every level is the default choice when a finer level
//! has to be filled in without a match.

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

const BUNDLED_DATASET: &str = include_str!("../../data/locations.json");

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read location dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("location dataset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("location dataset has an unexpected shape at '{path}': expected {expected}")]
    Shape { path: String, expected: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct City {
    pub name: String,
    pub villages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct District {
    pub name: String,
    pub cities: Vec<City>,
}

impl District {
    pub fn city_names(&self) -> Vec<&str> {
        self.cities.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn city(&self, name: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub name: String,
    pub districts: Vec<District>,
}

impl State {
    pub fn district_names(&self) -> Vec<&str> {
        self.districts.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn district(&self, name: &str) -> Option<&District> {
        self.districts.iter().find(|d| d.name == name)
    }
}

/// Option lists for a cascading state/district/city/village selection.
///
/// A level is empty when its parent is unset or unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocationOptions {
    pub states: Vec<String>,
    pub districts: Vec<String>,
    pub cities: Vec<String>,
    pub villages: Vec<String>,
}

/// Read-only location tree. Loaded once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationHierarchy {
    states: Vec<State>,
}

impl LocationHierarchy {
    /// The dataset compiled into the binary.
    pub fn bundled() -> Result<Self, LoadError> {
        Self::from_json(BUNDLED_DATASET)
    }

    /// Loads a dataset from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path)?;
        let hierarchy = Self::from_json(&content)?;
        debug!(path = %path.display(), states = hierarchy.states.len(), "Location dataset loaded");
        Ok(hierarchy)
    }

    pub fn from_json(content: &str) -> Result<Self, LoadError> {
        let root: Value = serde_json::from_str(content)?;
        let states = as_object(&root, "$")?
            .iter()
            .map(|(state, districts)| parse_state(state, districts))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { states })
    }

    pub fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn district(&self, state: &str, district: &str) -> Option<&District> {
        self.state(state)?.district(district)
    }

    pub fn city(&self, state: &str, district: &str, city: &str) -> Option<&City> {
        self.district(state, district)?.city(city)
    }

    /// Returns `true` if the full path exists and `village` is listed under it.
    pub fn contains(&self, state: &str, district: &str, city: &str, village: &str) -> bool {
        self.city(state, district, city)
            .is_some_and(|c| c.villages.iter().any(|v| v == village))
    }

    /// Option lists for each level of a selection, as a cascading picker
    /// would show them.
    pub fn options(&self, state: &str, district: &str, city: &str) -> LocationOptions {
        let owned = |names: Vec<&str>| names.into_iter().map(str::to_string).collect();

        let state_entry = self.state(state);
        let district_entry = state_entry.and_then(|s| s.district(district));
        let city_entry = district_entry.and_then(|d| d.city(city));

        LocationOptions {
            states: owned(self.state_names()),
            districts: state_entry.map(|s| owned(s.district_names())).unwrap_or_default(),
            cities: district_entry.map(|d| owned(d.city_names())).unwrap_or_default(),
            villages: city_entry.map(|c| c.villages.clone()).unwrap_or_default(),
        }
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, LoadError> {
    value.as_object().ok_or_else(|| LoadError::Shape {
        path: path.to_string(),
        expected: "an object",
    })
}

fn parse_state(name: &str, districts: &Value) -> Result<State, LoadError> {
    let districts = as_object(districts, name)?
        .iter()
        .map(|(district, cities)| parse_district(name, district, cities))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(State {
        name: name.to_string(),
        districts,
    })
}

fn parse_district(state: &str, name: &str, cities: &Value) -> Result<District, LoadError> {
    let path = format!("{state}/{name}");
    let cities = as_object(cities, &path)?
        .iter()
        .map(|(city, villages)| parse_city(&path, city, villages))
        .collect();

    Ok(District {
        name: name.to_string(),
        cities,
    })
}

/// Village lists are leaves: `null`, a non-array or non-string entries are
/// dropped with a warning instead of failing the load.
fn parse_city(parent: &str, name: &str, villages: &Value) -> City {
    let villages = match villages {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| {
                let village = v.as_str().map(str::to_string);
                if village.is_none() {
                    warn!(path = %format!("{parent}/{name}"), entry = %v, "Skipping non-string village");
                }
                village
            })
            .collect(),
        Value::Null => Vec::new(),
        other => {
            warn!(path = %format!("{parent}/{name}"), value = %other, "Village list is not an array, treating as empty");
            Vec::new()
        }
    };

    City {
        name: name.to_string(),
        villages,
    }
}
