use serde::{Serialize, Serializer};
use tracing::debug;

use super::hierarchy::LocationHierarchy;
use super::matcher::find_best_match;
use super::DetectedLocation;

/// Outcome of matching a [`DetectedLocation`] against the dataset.
///
/// `Matched` only ever carries names that exist in the dataset at the
/// right depth. `village` may be empty when the source data lists no
/// villages for the city.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciledLocation {
    Matched {
        state: String,
        district: String,
        city: String,
        village: String,
    },
    Unmatched { state: Option<String> },
}

#[derive(Serialize)]
struct ReconciledWire<'a> {
    matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    district: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    city: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    village: Option<&'a str>,
}

impl Serialize for ReconciledLocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            ReconciledLocation::Matched {
                state,
                district,
                city,
                village,
            } => ReconciledWire {
                matched: true,
                state: Some(state.as_str()),
                district: Some(district.as_str()),
                city: Some(city.as_str()),
                village: Some(village.as_str()),
            },
            ReconciledLocation::Unmatched { state } => ReconciledWire {
                matched: false,
                state: state.as_deref(),
                district: None,
                city: None,
                village: None,
            },
        };
        wire.serialize(serializer)
    }
}

impl ReconciledLocation {
    pub fn is_matched(&self) -> bool {
        matches!(self, ReconciledLocation::Matched { .. })
    }

    /// The resolved state, if reconciliation got that far.
    pub fn state(&self) -> Option<&str> {
        match self {
            ReconciledLocation::Matched { state, .. } => Some(state),
            ReconciledLocation::Unmatched { state } => state.as_deref(),
        }
    }
}

/// Resolves a detected location to a state/district/city/village path.
///
/// State and district must match (see [`find_best_match`]). The city is
/// matched too, but falls back to the district's first city. The village
/// is always the city's first village. Geocoder noise grows at finer
/// levels, so callers should check [`ReconciledLocation::is_matched`]
/// before trusting the village.
pub fn reconcile(detected: &DetectedLocation, hierarchy: &LocationHierarchy) -> ReconciledLocation {
    let Some(state) = find_best_match(&hierarchy.state_names(), &detected.state) else {
        debug!(state = %detected.state, "No state match");
        return ReconciledLocation::Unmatched { state: None };
    };
    let unmatched = || ReconciledLocation::Unmatched {
        state: Some(state.to_string()),
    };

    let Some(state_entry) = hierarchy.state(state) else {
        return unmatched();
    };

    let Some(district) = find_best_match(&state_entry.district_names(), &detected.district) else {
        debug!(state, district = %detected.district, "No district match");
        return unmatched();
    };
    let Some(district_entry) = state_entry.district(district) else {
        return unmatched();
    };

    let cities = district_entry.city_names();
    let Some(city) = find_best_match(&cities, &detected.city).or_else(|| cities.first().copied())
    else {
        debug!(state, district, "District lists no cities");
        return unmatched();
    };

    let village = district_entry
        .city(city)
        .and_then(|c| c.villages.first())
        .cloned()
        .unwrap_or_default();

    ReconciledLocation::Matched {
        state: state.to_string(),
        district: district.to_string(),
        city: city.to_string(),
        village,
    }
}
