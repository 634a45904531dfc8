//! Position sources for hosts without a live location sensor.

use async_trait::async_trait;

use crate::location::Coordinates;
use crate::services::{PositionError, PositionSource};

/// Reports a position supplied up front, e.g. from command-line flags.
pub struct FixedPosition(pub Coordinates);

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(&self) -> Result<Coordinates, PositionError> {
        Ok(self.0)
    }
}

/// A host with no way to determine its position.
pub struct NoPosition;

#[async_trait]
impl PositionSource for NoPosition {
    async fn current_position(&self) -> Result<Coordinates, PositionError> {
        Err(PositionError::Unsupported)
    }
}
