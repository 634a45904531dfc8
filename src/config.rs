//! Runtime settings read from the environment (after `.env`).

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::infra::{nominatim, open_meteo};
use crate::location::LocationHierarchy;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_SESSION_PATH: &str = ".pest_advisory/session.json";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base: String,
    pub nominatim_base: String,
    pub open_meteo_base: String,
    /// Replaces the bundled location dataset when set.
    pub locations_path: Option<PathBuf>,
    pub session_path: PathBuf,
    pub http_timeout: Duration,
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let http_timeout = match get("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("HTTP_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"))?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let settings = Self {
            api_base: get("ADVISORY_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            nominatim_base: get("NOMINATIM_BASE_URL")
                .unwrap_or_else(|| nominatim::DEFAULT_BASE_URL.to_string()),
            open_meteo_base: get("OPEN_METEO_BASE_URL")
                .unwrap_or_else(|| open_meteo::DEFAULT_BASE_URL.to_string()),
            locations_path: get("LOCATIONS_PATH").map(PathBuf::from),
            session_path: get("SESSION_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_PATH)),
            http_timeout: Duration::from_secs(http_timeout),
        };
        debug!(?settings, "Settings loaded");
        Ok(settings)
    }

    /// The configured location dataset, or the bundled one.
    pub fn load_hierarchy(&self) -> Result<LocationHierarchy> {
        match &self.locations_path {
            Some(path) => {
                info!(path = %path.display(), "Loading location dataset");
                LocationHierarchy::load(path)
                    .with_context(|| format!("failed to load locations from {}", path.display()))
            }
            None => Ok(LocationHierarchy::bundled()?),
        }
    }
}
