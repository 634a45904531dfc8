//! Location reconciliation against the static administrative dataset.
//!
//! [`LocationHierarchy`] is the dataset, [`normalize_name`] and
//! [`find_best_match`] compare free-text names against it, and
//! [`reconcile`] turns a reverse-geocoded [`DetectedLocation`] into a
//! [`ReconciledLocation`].

pub mod hierarchy;
pub mod matcher;
pub mod reconcile;

pub use hierarchy::{City, District, LoadError, LocationHierarchy, LocationOptions, State};
pub use matcher::{find_best_match, normalize_name};
pub use reconcile::{ReconciledLocation, reconcile};

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Place names reported by a reverse geocoder for one position fix.
///
/// The names are noisy: they may carry suffixes such as "District" or be
/// placeholder labels when the geocoder omitted a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLocation {
    pub city: String,
    pub district: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl DetectedLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// `"city, district, state"` as shown next to the form.
    pub fn label(&self) -> String {
        format!("{}, {}, {}", self.city, self.district, self.state)
    }
}

/// The site used whenever the device position cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultLocation {
    pub state: &'static str,
    pub district: &'static str,
    pub city: &'static str,
    pub village: &'static str,
    pub area: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

pub const DEFAULT_LOCATION: DefaultLocation = DefaultLocation {
    state: "Maharashtra",
    district: "Jalgaon",
    city: "Bodwad",
    village: "Salshingi",
    area: "Bodwad",
    latitude: 21.038,
    longitude: 75.55,
};

impl DefaultLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn label(&self) -> String {
        format!("{}, {}, {}", self.area, self.district, self.state)
    }

    pub fn reconciled(&self) -> ReconciledLocation {
        ReconciledLocation::Matched {
            state: self.state.to_string(),
            district: self.district.to_string(),
            city: self.city.to_string(),
            village: self.village.to_string(),
        }
    }
}
