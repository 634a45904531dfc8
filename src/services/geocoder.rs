use anyhow::Result;
use async_trait::async_trait;

use crate::location::{Coordinates, DetectedLocation};

/// Reverse geocoding: position → human-readable place names.
///
/// Implementations fill every name, substituting a placeholder label when
/// the provider leaves a field out, so callers always get three strings.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, at: Coordinates) -> Result<DetectedLocation>;
}
