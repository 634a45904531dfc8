use async_trait::async_trait;
use thiserror::Error;

use crate::location::Coordinates;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("location services are not supported on this device")]
    Unsupported,
    #[error("location permission was denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    Unavailable(String),
}

/// Source of the device's current position fix.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, PositionError>;
}
