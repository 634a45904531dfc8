//! Local prediction history: one CSV row per prediction.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::{debug, info};

use crate::api::types::PredictionRecord;
use crate::form::{MockPrediction, ValidatedPrediction};
use crate::risk::RiskTier;

/// Where a prediction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSource {
    Mock,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub recorded_at: DateTime<Utc>,
    pub source: PredictionSource,
    pub crop_type: String,
    pub crop_stage: String,
    pub state: String,
    pub district: String,
    pub city: String,
    pub village: String,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub wind_speed: f64,
    pub soil_moisture: f64,
    pub risk: RiskTier,
    pub confidence_percent: u32,
    pub prediction_date: NaiveDate,
}

impl HistoryRecord {
    pub fn from_mock(input: &ValidatedPrediction, result: &MockPrediction) -> Self {
        let loc = &input.location;
        Self {
            recorded_at: Utc::now(),
            source: PredictionSource::Mock,
            crop_type: input.crop_type.to_string(),
            crop_stage: input.crop_stage.to_string(),
            state: loc.state.clone(),
            district: loc.district.clone(),
            city: loc.city.clone(),
            village: loc.village.clone(),
            temperature: input.temperature,
            humidity: input.humidity,
            rainfall: input.rainfall,
            wind_speed: input.wind_speed,
            soil_moisture: input.soil_moisture,
            risk: result.assessment.risk,
            confidence_percent: u32::from(result.assessment.confidence_percent),
            prediction_date: input.date,
        }
    }

    pub fn from_remote(record: &PredictionRecord) -> Self {
        Self {
            recorded_at: record.created_at.unwrap_or_else(Utc::now),
            source: PredictionSource::Remote,
            crop_type: record.crop_type.clone(),
            crop_stage: record.crop_stage.clone(),
            state: record.state.clone(),
            district: record.district.clone(),
            city: record.city.clone(),
            village: record.village.clone(),
            temperature: record.temperature,
            humidity: record.humidity,
            rainfall: record.rainfall,
            wind_speed: record.wind_speed,
            soil_moisture: record.soil_moisture,
            risk: record.risk(),
            confidence_percent: record.confidence_percent(),
            prediction_date: record.prediction_date,
        }
    }
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends a [`HistoryRecord`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &Path, record: &HistoryRecord) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // header only on the first write
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

/// Reads every row of a history file, oldest first.
pub fn read_records(path: &Path) -> Result<Vec<HistoryRecord>> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: HistoryRecord = result?;
        rows.push(record);
    }

    debug!(path = %path.display(), rows = rows.len(), "History loaded");
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    pub(crate) fn sample(date: &str, risk: RiskTier, temperature: f64, humidity: f64) -> HistoryRecord {
        HistoryRecord {
            recorded_at: Utc::now(),
            source: PredictionSource::Mock,
            crop_type: "rice".into(),
            crop_stage: "vegetative".into(),
            state: "Maharashtra".into(),
            district: "Jalgaon".into(),
            city: "Bodwad".into(),
            village: "Salshingi".into(),
            temperature,
            humidity,
            rainfall: 10.0,
            wind_speed: 5.0,
            soil_moisture: 40.0,
            risk,
            confidence_percent: 80,
            prediction_date: date.parse().unwrap(),
        }
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&sample("2024-07-01", RiskTier::Low, 25.0, 50.0)).unwrap();
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("pest_advisory_test_header.csv");
        let _ = fs::remove_file(&path);

        let record = sample("2024-07-01", RiskTier::High, 30.0, 85.0);
        append_record(&path, &record).unwrap();
        append_record(&path, &record).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("recorded_at")).count();
        assert_eq!(header_count, 1);
        // 1 header + 2 data rows
        assert_eq!(content.lines().count(), 3);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_records_read_back() {
        let path = temp_path("pest_advisory_test_roundtrip.csv");
        let _ = fs::remove_file(&path);

        let first = sample("2024-07-01", RiskTier::High, 30.0, 85.0);
        let second = sample("2024-07-02", RiskTier::Low, 22.5, 40.0);
        append_record(&path, &first).unwrap();
        append_record(&path, &second).unwrap();

        let rows = read_records(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].risk, RiskTier::High);
        assert_eq!(rows[1].temperature, 22.5);
        assert_eq!(rows[1].source, PredictionSource::Mock);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_missing_file_fails() {
        assert!(read_records(&temp_path("pest_advisory_test_missing.csv")).is_err());
    }
}
