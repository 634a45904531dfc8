//! CLI entry point for the pest-risk advisory client.
//!
//! Provides subcommands for resolving the current location, browsing the
//! location dataset, running predictions (local heuristic or the advisory
//! API), managing the signed-in session and summarizing history.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use pest_advisory::api::types::{Credentials, PredictionAnalytics};
use pest_advisory::api::{AdvisoryClient, signed_in};
use pest_advisory::analytics::summarize;
use pest_advisory::config::Settings;
use pest_advisory::fetch::BasicClient;
use pest_advisory::form::{CropStage, CropType, Field, FieldErrors, PredictionForm};
use pest_advisory::infra::nominatim::client::NominatimClient;
use pest_advisory::infra::open_meteo::client::OpenMeteoClient;
use pest_advisory::infra::position::{FixedPosition, NoPosition};
use pest_advisory::infra::session::FileSessionStore;
use pest_advisory::location::{Coordinates, DetectedLocation, LocationHierarchy, reconcile};
use pest_advisory::output::{HistoryRecord, append_record, print_json, read_records};
use pest_advisory::services::PositionSource;
use pest_advisory::session::{Session, Theme};
use pest_advisory::sync::{LocationResolver, LocationSync};
use serde_json::json;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "pest-advisory")]
#[command(about = "Crop pest-risk advisories from location and weather", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a position (or the default site) to a dataset location and fetch its weather
    Locate {
        #[command(flatten)]
        position: PositionArgs,

        /// Reconcile a named place instead of geocoding a position
        #[arg(long, requires_all = ["district", "state"], conflicts_with_all = ["lat", "lon"])]
        city: Option<String>,

        #[arg(long, requires = "city")]
        district: Option<String>,

        #[arg(long, requires = "city")]
        state: Option<String>,
    },
    /// Show the cascading location options for a partial selection
    Options {
        #[arg(long, default_value = "")]
        state: String,

        #[arg(long, default_value = "")]
        district: String,

        #[arg(long, default_value = "")]
        city: String,
    },
    /// Validate inputs and produce a pest-risk prediction
    Predict(PredictArgs),
    /// Create an account on the advisory service
    Register {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },
    /// Sign in and store the session token
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },
    /// Sign out and clear the stored token
    Logout,
    /// Show the signed-in account
    Whoami,
    /// List stored predictions
    Predictions {
        /// Only the most recent prediction
        #[arg(long, conflicts_with = "id")]
        latest: bool,

        /// A single prediction by id
        #[arg(long)]
        id: Option<i64>,
    },
    /// Summarize predictions from the service or a local CSV history
    Analytics {
        /// CSV history file to summarize instead of the service
        #[arg(long, value_name = "CSV")]
        history: Option<PathBuf>,
    },
    /// Show or change the colour theme
    Theme {
        #[arg(value_name = "light|dark")]
        theme: Option<Theme>,
    },
}

#[derive(Args)]
struct PositionArgs {
    /// Device latitude; without a position the default site is used
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,
}

impl PositionArgs {
    fn source(&self) -> Arc<dyn PositionSource> {
        match (self.lat, self.lon) {
            (Some(latitude), Some(longitude)) => Arc::new(FixedPosition(Coordinates {
                latitude,
                longitude,
            })),
            _ => Arc::new(NoPosition),
        }
    }
}

#[derive(Args)]
struct PredictArgs {
    #[arg(long, default_value = "rice")]
    crop: CropType,

    #[arg(long, default_value = "vegetative")]
    stage: CropStage,

    /// Prediction date (YYYY-MM-DD), today by default
    #[arg(long)]
    date: Option<NaiveDate>,

    #[command(flatten)]
    position: PositionArgs,

    /// Pick the location by name instead of detecting it
    #[arg(long, requires_all = ["state", "district", "city", "village"], conflicts_with_all = ["lat", "lon"])]
    manual: bool,

    #[arg(long, requires = "manual")]
    state: Option<String>,

    #[arg(long, requires = "manual")]
    district: Option<String>,

    #[arg(long, requires = "manual")]
    city: Option<String>,

    #[arg(long, requires = "manual")]
    village: Option<String>,

    /// °C; overrides the weather lookup
    #[arg(long, allow_negative_numbers = true)]
    temperature: Option<String>,

    /// %; overrides the weather lookup
    #[arg(long)]
    humidity: Option<String>,

    /// mm; overrides the weather lookup
    #[arg(long)]
    rainfall: Option<String>,

    /// km/h; overrides the weather lookup
    #[arg(long)]
    wind_speed: Option<String>,

    /// %
    #[arg(long)]
    soil_moisture: Option<String>,

    /// Submit to the advisory service instead of scoring locally
    #[arg(long)]
    remote: bool,

    /// CSV file to append the prediction to
    #[arg(long, value_name = "CSV")]
    history: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging setup: colored stderr + JSON rolling log file
    dotenvy::dotenv().ok();
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/pest_advisory.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("pest_advisory.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let http = Arc::new(BasicClient::new(settings.http_timeout)?);

    match cli.command {
        Commands::Locate {
            position,
            city,
            district,
            state,
        } => {
            let hierarchy = Arc::new(settings.load_hierarchy()?);
            match (city, district, state) {
                (Some(city), Some(district), Some(state)) => {
                    let detected = DetectedLocation {
                        city,
                        district,
                        state,
                        latitude: 0.0,
                        longitude: 0.0,
                    };
                    let reconciled = reconcile(&detected, &hierarchy);
                    print_json(&json!({
                        "detected": detected.label(),
                        "reconciled": reconciled,
                    }))?;
                }
                _ => {
                    let resolver =
                        build_resolver(&settings, &http, position.source(), hierarchy);
                    let outcome = resolver.resolve().await;
                    print_json(&json!({
                        "site": outcome.site,
                        "notice": outcome.location_notice.as_ref().map(ToString::to_string),
                        "weather": outcome.climate.as_ref().ok(),
                        "weather_error": outcome.climate.as_ref().err().map(ToString::to_string),
                    }))?;
                }
            }
        }
        Commands::Options {
            state,
            district,
            city,
        } => {
            let hierarchy = settings.load_hierarchy()?;
            print_json(&hierarchy.options(&state, &district, &city))?;
        }
        Commands::Predict(args) => {
            predict(&settings, http, args).await?;
        }
        Commands::Register { email, password } => {
            let client = AdvisoryClient::new(http, &settings.api_base)?;
            let user = client.register(&Credentials { email, password }).await?;
            info!(id = user.id, email = %user.email, "Registered; log in to continue");
        }
        Commands::Login { email, password } => {
            let client = AdvisoryClient::new(http, &settings.api_base)?;
            let mut session = open_session(&settings).await?;
            let login = client.login(&Credentials { email, password }).await?;
            session.sign_in(login.token).await?;
            info!(
                email = login.email.as_deref().unwrap_or_default(),
                message = login.message.as_deref().unwrap_or("Login successful"),
                "Signed in"
            );
        }
        Commands::Logout => {
            let client = AdvisoryClient::new(http, &settings.api_base)?;
            let mut session = open_session(&settings).await?;
            if session.is_signed_in() {
                let authorized = client.authorize(&session)?;
                if let Err(e) = authorized.logout().await {
                    warn!(error = %e, "Server-side logout failed, clearing local session anyway");
                }
            }
            session.clear().await?;
            info!("Signed out");
        }
        Commands::Whoami => {
            let client = AdvisoryClient::new(http, &settings.api_base)?;
            let mut session = open_session(&settings).await?;
            if !session.is_signed_in() {
                info!("Not signed in");
                return Ok(());
            }
            let authorized = client.authorize(&session)?;
            let profile = signed_in(&mut session, authorized.validate_token().await).await?;
            print_json(&profile)?;
        }
        Commands::Predictions { latest, id } => {
            let client = AdvisoryClient::new(http, &settings.api_base)?;
            let mut session = open_session(&settings).await?;
            let authorized = client.authorize(&session)?;

            if latest || id.is_some() {
                let found = match id {
                    Some(id) => authorized.prediction(id).await,
                    None => authorized.latest_prediction().await,
                };
                match signed_in(&mut session, found).await? {
                    Some(record) => print_json(&record)?,
                    None => info!("No matching prediction"),
                }
            } else {
                let records = signed_in(&mut session, authorized.predictions().await).await?;
                info!(total = records.len(), "Predictions fetched");
                print_json(&records)?;
            }
        }
        Commands::Analytics { history } => {
            let analytics: PredictionAnalytics = match history {
                Some(path) => summarize(&read_records(&path)?),
                None => {
                    let client = AdvisoryClient::new(http, &settings.api_base)?;
                    let mut session = open_session(&settings).await?;
                    let authorized = client.authorize(&session)?;
                    signed_in(&mut session, authorized.analytics().await).await?
                }
            };
            print_json(&analytics)?;
        }
        Commands::Theme { theme } => {
            let mut session = open_session(&settings).await?;
            if let Some(theme) = theme {
                session.set_theme(theme).await?;
            }
            info!(theme = %session.theme(), "Theme");
        }
    }

    Ok(())
}

async fn open_session(settings: &Settings) -> Result<Session> {
    let store = Arc::new(FileSessionStore::new(settings.session_path.clone()));
    Session::init(store).await
}

fn report_invalid(errors: FieldErrors) -> anyhow::Error {
    for (field, e) in &errors.0 {
        error!(%field, error = %e, "Invalid input");
    }
    anyhow!(errors)
}

fn build_resolver(
    settings: &Settings,
    http: &Arc<BasicClient>,
    position: Arc<dyn PositionSource>,
    hierarchy: Arc<LocationHierarchy>,
) -> LocationResolver {
    LocationResolver::new(
        position,
        Arc::new(NominatimClient::new(http.clone(), &settings.nominatim_base)),
        Arc::new(OpenMeteoClient::new(http.clone(), &settings.open_meteo_base)),
        hierarchy,
    )
}

/// Fills the form (detected or manual location, weather, then any
/// overrides), validates it and scores it locally or remotely.
#[tracing::instrument(skip_all, fields(crop = %args.crop, remote = args.remote))]
async fn predict(settings: &Settings, http: Arc<BasicClient>, args: PredictArgs) -> Result<()> {
    let hierarchy = Arc::new(settings.load_hierarchy()?);
    let form = Arc::new(Mutex::new(PredictionForm::new(hierarchy.clone())));

    if !args.manual {
        let resolver = build_resolver(settings, &http, args.position.source(), hierarchy);
        let mut sync = LocationSync::new(Arc::new(resolver), form.clone());
        sync.start();
        sync.settle().await;
    }

    let validated = {
        let mut form = form.lock().map_err(|_| anyhow!("form state was poisoned"))?;

        if args.manual {
            form.set_use_current_location(false);
            let entered = form.enter_location(
                args.state.as_deref().unwrap_or_default(),
                args.district.as_deref().unwrap_or_default(),
                args.city.as_deref().unwrap_or_default(),
                args.village.as_deref().unwrap_or_default(),
            );
            if let Err(errors) = entered {
                return Err(report_invalid(errors));
            }
        } else {
            let badge = form.badge();
            info!(location = %badge.label, notice = ?badge.notice, "Using location");
            if let Some(notice) = &form.weather().notice {
                warn!(%notice, "Enter weather values manually");
            }
        }

        form.crop_type = args.crop;
        form.crop_stage = args.stage;
        if let Some(date) = args.date {
            form.date = date;
        }

        for (field, value) in [
            (Field::Temperature, args.temperature),
            (Field::Humidity, args.humidity),
            (Field::Rainfall, args.rainfall),
            (Field::WindSpeed, args.wind_speed),
            (Field::SoilMoisture, args.soil_moisture),
        ] {
            if let Some(value) = value {
                form.set_input(field, value);
            }
        }

        if form.is_auto_synced() {
            debug!(selection = ?form.selection(), "Location locked to detected site");
        }

        match form.validate() {
            Ok(validated) => validated,
            Err(errors) => return Err(report_invalid(errors)),
        }
    };

    let record = if args.remote {
        let client = AdvisoryClient::new(http, &settings.api_base)?;
        let mut session = open_session(settings).await?;
        let authorized = client.authorize(&session)?;
        let created = signed_in(
            &mut session,
            authorized.create_prediction(&validated.to_request()).await,
        )
        .await?;
        print_json(&created)?;
        HistoryRecord::from_remote(&created)
    } else {
        let result = validated.mock_result();
        info!(
            location = %validated.location_label,
            risk = %result.assessment.risk,
            confidence = result.assessment.confidence_percent,
            "Mock prediction"
        );
        print_json(&result)?;
        HistoryRecord::from_mock(&validated, &result)
    };

    if let Some(path) = &args.history {
        append_record(path, &record)?;
        info!(path = %path.display(), "Prediction appended to history");
    }

    Ok(())
}
