//! Location sync: device position → reverse geocode → reconcile → weather.
//!
//! [`LocationResolver::detect`] reports failures as a [`LocationError`].
//! [`LocationResolver::resolve`] applies the fallback policy on top of it:
//! whenever detection fails, the site becomes [`DEFAULT_LOCATION`] and the
//! error is kept as a notice for the user. Weather is then looked up for
//! whichever site was chosen; a weather failure does not change the site.
//!
//! [`LocationSync`] runs attempts as tasks. Starting a new attempt, or
//! turning "use current location" off, aborts the one in flight, and a
//! result is only written to the form if its attempt is still current.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use crate::form::PredictionForm;
use crate::location::{
    Coordinates, DEFAULT_LOCATION, DetectedLocation, LocationHierarchy, ReconciledLocation,
    reconcile,
};
use crate::services::{ClimateReading, Geocoder, PositionError, PositionSource, WeatherApi};

pub const POSITION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location services are not supported on this device")]
    Unsupported,
    #[error("location permission was denied")]
    PermissionDenied,
    #[error("timed out waiting for a position fix")]
    Timeout,
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
    #[error("could not look up the current location: {0}")]
    Geocode(String),
    #[error("could not fetch current weather: {0}")]
    Weather(String),
}

impl From<PositionError> for LocationError {
    fn from(e: PositionError) -> Self {
        match e {
            PositionError::Unsupported => LocationError::Unsupported,
            PositionError::PermissionDenied => LocationError::PermissionDenied,
            PositionError::Unavailable(reason) => LocationError::PositionUnavailable(reason),
        }
    }
}

/// A successfully detected and reconciled position.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedSite {
    pub detected: DetectedLocation,
    pub reconciled: ReconciledLocation,
}

/// The site a sync settled on, detected or fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSite {
    pub label: String,
    pub coordinates: Coordinates,
    pub reconciled: ReconciledLocation,
    pub is_fallback: bool,
}

impl ResolvedSite {
    pub fn fallback() -> Self {
        Self {
            label: DEFAULT_LOCATION.label(),
            coordinates: DEFAULT_LOCATION.coordinates(),
            reconciled: DEFAULT_LOCATION.reconciled(),
            is_fallback: true,
        }
    }
}

impl From<DetectedSite> for ResolvedSite {
    fn from(site: DetectedSite) -> Self {
        Self {
            label: site.detected.label(),
            coordinates: site.detected.coordinates(),
            reconciled: site.reconciled,
            is_fallback: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub site: ResolvedSite,
    /// Set when detection failed and the default site was used instead.
    pub location_notice: Option<LocationError>,
    pub climate: Result<ClimateReading, LocationError>,
}

impl SyncOutcome {
    /// Writes the outcome into the form.
    pub fn apply_to(&self, form: &mut PredictionForm) {
        form.apply_location(
            self.site.label.clone(),
            self.site.coordinates,
            &self.site.reconciled,
            self.location_notice.as_ref().map(ToString::to_string),
        );
        match &self.climate {
            Ok(reading) => form.apply_climate(reading),
            Err(e) => form.weather_failed(e.to_string()),
        }
    }
}

pub struct LocationResolver {
    position: Arc<dyn PositionSource>,
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherApi>,
    hierarchy: Arc<LocationHierarchy>,
    position_timeout: Duration,
}

impl LocationResolver {
    pub fn new(
        position: Arc<dyn PositionSource>,
        geocoder: Arc<dyn Geocoder>,
        weather: Arc<dyn WeatherApi>,
        hierarchy: Arc<LocationHierarchy>,
    ) -> Self {
        Self {
            position,
            geocoder,
            weather,
            hierarchy,
            position_timeout: POSITION_TIMEOUT,
        }
    }

    pub fn with_position_timeout(mut self, timeout: Duration) -> Self {
        self.position_timeout = timeout;
        self
    }

    /// Position fix, reverse geocode and reconciliation, in that order.
    #[tracing::instrument(skip(self))]
    pub async fn detect(&self) -> Result<DetectedSite, LocationError> {
        let at = tokio::time::timeout(self.position_timeout, self.position.current_position())
            .await
            .map_err(|_| LocationError::Timeout)??;
        debug!(lat = at.latitude, lon = at.longitude, "Position fix acquired");

        let detected = self
            .geocoder
            .reverse(at)
            .await
            .map_err(|e| LocationError::Geocode(format!("{e:#}")))?;

        let reconciled = reconcile(&detected, &self.hierarchy);
        info!(
            label = %detected.label(),
            matched = reconciled.is_matched(),
            "Location detected"
        );

        Ok(DetectedSite {
            detected,
            reconciled,
        })
    }

    pub async fn fetch_climate(&self, at: Coordinates) -> Result<ClimateReading, LocationError> {
        self.weather.current(at).await.map_err(|e| {
            warn!(error = %e, "Weather lookup failed");
            LocationError::Weather(format!("{e:#}"))
        })
    }

    /// Detects the site, falling back to [`DEFAULT_LOCATION`] on failure,
    /// then fetches weather for it.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self) -> SyncOutcome {
        let (site, location_notice) = match self.detect().await {
            Ok(site) => (ResolvedSite::from(site), None),
            Err(e) => {
                warn!(error = %e, "Location detection failed, using default location");
                (ResolvedSite::fallback(), Some(e))
            }
        };

        let climate = self.fetch_climate(site.coordinates).await;

        SyncOutcome {
            site,
            location_notice,
            climate,
        }
    }
}

/// Drives [`LocationResolver::resolve`] for a shared form, one attempt at
/// a time.
pub struct LocationSync {
    resolver: Arc<LocationResolver>,
    form: Arc<Mutex<PredictionForm>>,
    attempt: Arc<AtomicU64>,
    in_flight: Option<JoinHandle<()>>,
}

impl LocationSync {
    pub fn new(resolver: Arc<LocationResolver>, form: Arc<Mutex<PredictionForm>>) -> Self {
        Self {
            resolver,
            form,
            attempt: Arc::new(AtomicU64::new(0)),
            in_flight: None,
        }
    }

    pub fn form(&self) -> &Arc<Mutex<PredictionForm>> {
        &self.form
    }

    /// Toggles "use current location". Turning it on starts a new attempt;
    /// either way the attempt in flight is abandoned.
    pub fn set_use_current_location(&mut self, enabled: bool) {
        self.cancel();
        with_form(&self.form, |f| f.set_use_current_location(enabled));
        if enabled {
            self.start();
        }
    }

    /// Starts a new attempt, superseding any attempt in flight. Returns
    /// the attempt number.
    pub fn start(&mut self) -> u64 {
        self.cancel();
        let attempt = self.attempt.fetch_add(1, Ordering::SeqCst) + 1;

        let resolver = self.resolver.clone();
        let form = self.form.clone();
        let current = self.attempt.clone();
        let span = tracing::info_span!("location_sync", attempt);

        self.in_flight = Some(tokio::spawn(
            async move {
                let outcome = resolver.resolve().await;
                with_form(&form, |f| {
                    if current.load(Ordering::SeqCst) != attempt {
                        debug!("Discarding superseded location result");
                        return;
                    }
                    outcome.apply_to(f);
                });
            }
            .instrument(span),
        ));

        attempt
    }

    /// Aborts the attempt in flight, if any. Its result will not be applied.
    pub fn cancel(&mut self) {
        self.attempt.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }

    /// Waits for the attempt in flight to finish.
    pub async fn settle(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!(error = %e, "Location sync task failed");
                }
            }
        }
    }
}

impl Drop for LocationSync {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

fn with_form(form: &Mutex<PredictionForm>, update: impl FnOnce(&mut PredictionForm)) {
    match form.lock() {
        Ok(mut guard) => update(&mut guard),
        Err(poisoned) => update(&mut poisoned.into_inner()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::position::{FixedPosition, NoPosition};
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct StaticGeocoder(Option<(&'static str, &'static str, &'static str)>);

    #[async_trait]
    impl Geocoder for StaticGeocoder {
        async fn reverse(&self, at: Coordinates) -> anyhow::Result<DetectedLocation> {
            let (city, district, state) = self.0.ok_or_else(|| anyhow!("503 from geocoder"))?;
            Ok(DetectedLocation {
                city: city.into(),
                district: district.into(),
                state: state.into(),
                latitude: at.latitude,
                longitude: at.longitude,
            })
        }
    }

    struct StaticWeather(Option<ClimateReading>);

    #[async_trait]
    impl WeatherApi for StaticWeather {
        async fn current(&self, _at: Coordinates) -> anyhow::Result<ClimateReading> {
            self.0.ok_or_else(|| anyhow!("weather service down"))
        }
    }

    struct Hanging;

    #[async_trait]
    impl PositionSource for Hanging {
        async fn current_position(&self) -> Result<Coordinates, PositionError> {
            std::future::pending().await
        }
    }

    const PUNE: Coordinates = Coordinates {
        latitude: 18.52,
        longitude: 73.85,
    };

    fn resolver(
        position: Arc<dyn PositionSource>,
        geocoder: StaticGeocoder,
        weather: StaticWeather,
    ) -> LocationResolver {
        LocationResolver::new(
            position,
            Arc::new(geocoder),
            Arc::new(weather),
            Arc::new(LocationHierarchy::bundled().unwrap()),
        )
    }

    fn reading() -> ClimateReading {
        ClimateReading {
            temperature: Some(29.6),
            humidity: Some(71.0),
            rainfall: Some(0.0),
            wind_speed: Some(8.2),
        }
    }

    #[tokio::test]
    async fn test_detect_reconciles() {
        let r = resolver(
            Arc::new(FixedPosition(PUNE)),
            StaticGeocoder(Some(("Haveli", "Pune District", "Maharashtra"))),
            StaticWeather(None),
        );
        let site = r.detect().await.unwrap();
        assert!(site.reconciled.is_matched());
        assert_eq!(site.detected.coordinates(), PUNE);
    }

    #[tokio::test]
    async fn test_detect_maps_position_errors() {
        let r = resolver(
            Arc::new(NoPosition),
            StaticGeocoder(None),
            StaticWeather(None),
        );
        assert_eq!(r.detect().await.unwrap_err(), LocationError::Unsupported);
    }

    #[tokio::test]
    async fn test_detect_times_out() {
        let r = resolver(Arc::new(Hanging), StaticGeocoder(None), StaticWeather(None))
            .with_position_timeout(Duration::from_millis(20));
        assert_eq!(r.detect().await.unwrap_err(), LocationError::Timeout);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_on_geocode_failure() {
        let r = resolver(
            Arc::new(FixedPosition(PUNE)),
            StaticGeocoder(None),
            StaticWeather(Some(reading())),
        );
        let outcome = r.resolve().await;

        assert!(outcome.site.is_fallback);
        assert_eq!(outcome.site.coordinates, DEFAULT_LOCATION.coordinates());
        assert_eq!(outcome.site.reconciled, DEFAULT_LOCATION.reconciled());
        assert!(matches!(
            outcome.location_notice,
            Some(LocationError::Geocode(_))
        ));
        assert_eq!(outcome.climate, Ok(reading()));
    }

    #[tokio::test]
    async fn test_resolve_keeps_site_when_weather_fails() {
        let r = resolver(
            Arc::new(FixedPosition(PUNE)),
            StaticGeocoder(Some(("Haveli", "Pune", "Maharashtra"))),
            StaticWeather(None),
        );
        let outcome = r.resolve().await;

        assert!(!outcome.site.is_fallback);
        assert_eq!(outcome.site.label, "Haveli, Pune, Maharashtra");
        assert!(outcome.location_notice.is_none());
        assert!(matches!(outcome.climate, Err(LocationError::Weather(_))));
    }

    #[test]
    fn test_position_error_mapping() {
        assert_eq!(
            LocationError::from(PositionError::PermissionDenied),
            LocationError::PermissionDenied
        );
        assert_eq!(
            LocationError::from(PositionError::Unavailable("no fix".into())),
            LocationError::PositionUnavailable("no fix".into())
        );
    }
}
