//! Aggregate statistics over prediction history, in the same shape the
//! advisory API reports them.

use crate::api::types::{ClimateTrendPoint, PredictionAnalytics, RiskDistribution};
use crate::output::HistoryRecord;
use crate::risk::RiskTier;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

/// Summarizes history records.
///
/// Averages and distribution percentages are rounded to two decimals.
/// The climate trend is ordered by prediction date; records sharing a
/// date keep their recorded order.
pub fn summarize(records: &[HistoryRecord]) -> PredictionAnalytics {
    let count = |tier: RiskTier| records.iter().filter(|r| r.risk == tier).count() as u64;

    let total = records.len() as u64;
    let high = count(RiskTier::High);
    let medium = count(RiskTier::Medium);
    let low = count(RiskTier::Low);

    let temperatures: Vec<f64> = records.iter().map(|r| r.temperature).collect();
    let humidities: Vec<f64> = records.iter().map(|r| r.humidity).collect();

    let mut ordered: Vec<&HistoryRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.prediction_date);

    let climate_trend = ordered
        .into_iter()
        .map(|r| ClimateTrendPoint {
            prediction_date: r.prediction_date,
            temperature: r.temperature,
            humidity: r.humidity,
        })
        .collect();

    PredictionAnalytics {
        total_predictions: total,
        high_risk_count: high,
        medium_risk_count: medium,
        low_risk_count: low,
        avg_temperature: round2(mean(&temperatures)),
        avg_humidity: round2(mean(&humidities)),
        risk_distribution: RiskDistribution {
            high: percent(high, total),
            medium: percent(medium, total),
            low: percent(low, total),
        },
        climate_trend,
    }
}
