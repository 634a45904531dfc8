//! Pest-risk advisory client: location reconciliation, weather-filled
//! prediction forms, a local risk heuristic and the advisory API.

pub mod analytics;
pub mod api;
pub mod config;
pub mod fetch;
pub mod form;
pub mod infra;
pub mod location;
pub mod output;
pub mod risk;
pub mod services;
pub mod session;
pub mod sync;
