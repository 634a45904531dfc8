use anyhow::anyhow;
use async_trait::async_trait;
use pest_advisory::analytics::summarize;
use pest_advisory::form::{Field, PredictionForm};
use pest_advisory::infra::position::{FixedPosition, NoPosition};
use pest_advisory::location::{
    Coordinates, DEFAULT_LOCATION, DetectedLocation, LocationHierarchy, ReconciledLocation,
    reconcile,
};
use pest_advisory::output::{HistoryRecord, append_record, read_records};
use pest_advisory::risk::RiskTier;
use pest_advisory::services::{ClimateReading, Geocoder, PositionError, PositionSource, WeatherApi};
use pest_advisory::sync::{LocationResolver, LocationSync};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

const BODWAD: Coordinates = Coordinates {
    latitude: 21.03,
    longitude: 75.84,
};

const PUNE: Coordinates = Coordinates {
    latitude: 18.52,
    longitude: 73.85,
};

/// Names positions north of 20°N as Bodwad and everything else as Haveli.
struct RegionGeocoder;

#[async_trait]
impl Geocoder for RegionGeocoder {
    async fn reverse(&self, at: Coordinates) -> anyhow::Result<DetectedLocation> {
        let (city, district) = if at.latitude > 20.0 {
            ("Bodwad", "Jalgaon District")
        } else {
            ("Haveli", "Pune District")
        };
        Ok(DetectedLocation {
            city: city.into(),
            district: district.into(),
            state: "Maharashtra".into(),
            latitude: at.latitude,
            longitude: at.longitude,
        })
    }
}

struct OffMapGeocoder;

#[async_trait]
impl Geocoder for OffMapGeocoder {
    async fn reverse(&self, at: Coordinates) -> anyhow::Result<DetectedLocation> {
        Ok(DetectedLocation {
            city: "Current location".into(),
            district: "Unknown district".into(),
            state: "Maharashtra".into(),
            latitude: at.latitude,
            longitude: at.longitude,
        })
    }
}

struct Weather(Option<ClimateReading>);

#[async_trait]
impl WeatherApi for Weather {
    async fn current(&self, _at: Coordinates) -> anyhow::Result<ClimateReading> {
        self.0.ok_or_else(|| anyhow!("weather service down"))
    }
}

/// First call is slow and reports Bodwad; later calls report Pune at once.
/// `entered` fires once the first call is underway.
#[derive(Default)]
struct SlowThenFast {
    calls: AtomicUsize,
    entered: Notify,
}

#[async_trait]
impl PositionSource for SlowThenFast {
    async fn current_position(&self) -> Result<Coordinates, PositionError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.notify_one();
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(BODWAD)
        } else {
            Ok(PUNE)
        }
    }
}

struct Hanging;

#[async_trait]
impl PositionSource for Hanging {
    async fn current_position(&self) -> Result<Coordinates, PositionError> {
        std::future::pending().await
    }
}

fn hierarchy() -> Arc<LocationHierarchy> {
    Arc::new(LocationHierarchy::bundled().expect("bundled dataset loads"))
}

fn reading() -> ClimateReading {
    ClimateReading {
        temperature: Some(29.6),
        humidity: Some(71.4),
        rainfall: Some(2.5),
        wind_speed: None,
    }
}

fn sync_with(
    position: Arc<dyn PositionSource>,
    geocoder: Arc<dyn Geocoder>,
    weather: Weather,
) -> LocationSync {
    let hierarchy = hierarchy();
    let resolver = LocationResolver::new(position, geocoder, Arc::new(weather), hierarchy.clone());
    let form = Arc::new(Mutex::new(PredictionForm::new(hierarchy)));
    LocationSync::new(Arc::new(resolver), form)
}

#[test]
fn test_reconcile_noisy_names_against_bundled_dataset() {
    let detected = DetectedLocation {
        city: "Bodwad".into(),
        district: "Jalgaon District".into(),
        state: "Maharashtra".into(),
        latitude: BODWAD.latitude,
        longitude: BODWAD.longitude,
    };

    assert_eq!(
        reconcile(&detected, &hierarchy()),
        ReconciledLocation::Matched {
            state: "Maharashtra".into(),
            district: "Jalgaon".into(),
            city: "Bodwad".into(),
            village: "Salshingi".into(),
        }
    );
}

#[tokio::test]
async fn test_sync_fills_form_from_detected_site() {
    let mut sync = sync_with(
        Arc::new(FixedPosition(PUNE)),
        Arc::new(RegionGeocoder),
        Weather(Some(reading())),
    );
    sync.start();
    sync.settle().await;

    let form = sync.form().lock().unwrap();
    assert!(form.is_auto_synced());
    assert!(form.manual_location_locked());
    assert_eq!(form.selection().district, "Pune");
    assert_eq!(form.selection().city, "Haveli");
    assert_eq!(form.selection().village, "Loni Kalbhor");
    assert_eq!(form.badge().label, "Haveli, Pune District, Maharashtra");
    assert_eq!(form.badge().notice, None);

    assert_eq!(form.input(Field::Temperature), "30");
    assert_eq!(form.input(Field::Humidity), "71");
    assert_eq!(form.input(Field::Rainfall), "3");
    assert_eq!(form.input(Field::WindSpeed), "");
    assert!(form.weather().auto_filled);
}

#[tokio::test]
async fn test_sync_without_position_uses_default_site() {
    let mut sync = sync_with(
        Arc::new(NoPosition),
        Arc::new(RegionGeocoder),
        Weather(None),
    );
    sync.start();
    sync.settle().await;

    let form = sync.form().lock().unwrap();
    assert_eq!(form.badge().label, DEFAULT_LOCATION.label());
    assert_eq!(form.badge().coordinates, DEFAULT_LOCATION.coordinates());
    assert!(form.badge().notice.is_some());
    assert_eq!(form.selection().village, DEFAULT_LOCATION.village);
    assert!(form.is_auto_synced());

    assert!(!form.weather().auto_filled);
    assert!(form.weather().notice.is_some());
}

#[tokio::test]
async fn test_unmatched_site_requires_manual_correction() {
    let mut sync = sync_with(
        Arc::new(FixedPosition(BODWAD)),
        Arc::new(OffMapGeocoder),
        Weather(Some(reading())),
    );
    sync.start();
    sync.settle().await;

    let form = sync.form().lock().unwrap();
    assert!(!form.is_auto_synced());
    assert!(!form.manual_location_locked());
    assert_eq!(form.selection().state, "Maharashtra");
    // finer levels re-seeded to the first options
    assert_eq!(form.selection().district, "Jalgaon");
    assert_eq!(form.selection().city, "Bodwad");
    assert_eq!(form.selection().village, "Salshingi");
}

#[tokio::test]
async fn test_superseded_attempt_is_discarded() {
    let position = Arc::new(SlowThenFast::default());
    let mut sync = sync_with(
        position.clone(),
        Arc::new(RegionGeocoder),
        Weather(Some(reading())),
    );
    let first = sync.start();
    // the first attempt is now waiting on its slow fix
    position.entered.notified().await;
    let second = sync.start();
    assert!(second > first);

    sync.settle().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(position.calls.load(Ordering::SeqCst), 2);
    let form = sync.form().lock().unwrap();
    assert_eq!(form.selection().district, "Pune");
    assert_eq!(form.badge().label, "Haveli, Pune District, Maharashtra");
}

#[tokio::test]
async fn test_turning_off_current_location_cancels_attempt() {
    let mut sync = sync_with(
        Arc::new(Hanging),
        Arc::new(RegionGeocoder),
        Weather(Some(reading())),
    );
    sync.start();
    sync.set_use_current_location(false);
    sync.settle().await;

    let form = sync.form().lock().unwrap();
    assert!(!form.uses_current_location());
    assert!(!form.manual_location_locked());
    assert_eq!(form.badge().notice, None);
    assert_eq!(form.input(Field::Temperature), "");
}

#[test]
fn test_manual_prediction_to_history_and_analytics() {
    let mut form = PredictionForm::new(hierarchy());
    form.set_use_current_location(false);
    form.select_state("Maharashtra");
    form.select_district("Pune");
    form.select_city("Baramati");
    form.select_village("Supe");
    form.date = "2024-07-01".parse().unwrap();

    form.set_input(Field::Temperature, "31");
    form.set_input(Field::Humidity, "90");
    form.set_input(Field::Rainfall, "120");
    form.set_input(Field::WindSpeed, "6");
    form.set_input(Field::SoilMoisture, "70");

    let validated = form.validate().expect("inputs are valid");
    assert_eq!(validated.location_label, "Supe, Baramati, Pune, Maharashtra");

    // 90*0.45 + 120*0.25 + 70*0.30 = 40.5 + 30 + 21 = 91.5
    let result = validated.mock_result();
    assert_eq!(result.assessment.risk, RiskTier::High);
    assert_eq!(result.assessment.confidence_percent, 95);

    let path = std::env::temp_dir().join("pest_advisory_integration_history.csv");
    let _ = std::fs::remove_file(&path);
    append_record(&path, &HistoryRecord::from_mock(&validated, &result)).unwrap();

    let analytics = summarize(&read_records(&path).unwrap());
    assert_eq!(analytics.total_predictions, 1);
    assert_eq!(analytics.high_risk_count, 1);
    assert_eq!(analytics.risk_distribution.high, 100.0);
    assert_eq!(analytics.avg_temperature, 31.0);

    std::fs::remove_file(&path).unwrap();
}
