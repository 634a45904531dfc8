//! Heuristic pest-risk scoring from climate inputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const HUMIDITY_WEIGHT: f64 = 0.45;
const RAINFALL_WEIGHT: f64 = 0.25;
const SOIL_MOISTURE_WEIGHT: f64 = 0.30;

pub const HIGH_RISK_SCORE: f64 = 70.0;
pub const MEDIUM_RISK_SCORE: f64 = 45.0;

pub const MIN_CONFIDENCE: u8 = 65;
pub const MAX_CONFIDENCE: u8 = 97;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Likely pest pressure for the tier, as shown with a mock result.
    pub fn pest_hint(&self) -> &'static str {
        match self {
            RiskTier::Low => "No significant pest pressure expected",
            RiskTier::Medium => "Aphids and leaf-feeding caterpillars",
            RiskTier::High => "Stem borers, whiteflies and fungal outbreaks",
        }
    }

    pub fn recommended_action(&self) -> &'static str {
        match self {
            RiskTier::Low => "Continue routine field scouting once a week.",
            RiskTier::Medium => {
                "Scout twice a week, set up pheromone traps and prepare bio-pesticides."
            }
            RiskTier::High => {
                "Inspect fields daily and apply recommended control measures without delay."
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }

    /// Reads a tier reported by the advisory API (`"High"`, `"medium"`, ...).
    /// Anything unrecognised is treated as low risk.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(RiskTier::Low)
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskTier::Low),
            "medium" => Ok(RiskTier::Medium),
            "high" => Ok(RiskTier::High),
            other => Err(format!("unknown risk tier '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk: RiskTier,
    /// Always within [`MIN_CONFIDENCE`]..=[`MAX_CONFIDENCE`].
    pub confidence_percent: u8,
}

/// Weighted climate score. Inputs are expected to be validated
/// (humidity and soil moisture in 0..=100, rainfall in 0..=500).
pub fn score(humidity: f64, rainfall: f64, soil_moisture: f64) -> f64 {
    humidity * HUMIDITY_WEIGHT + rainfall * RAINFALL_WEIGHT + soil_moisture * SOIL_MOISTURE_WEIGHT
}

/// Maps a score onto a risk tier.
///
/// | Score   | Tier   |
/// |---------|--------|
/// | >= 70   | high   |
/// | >= 45   | medium |
/// | < 45    | low    |
///
/// NaN compares false against both thresholds and lands on low.
pub fn tier(score: f64) -> RiskTier {
    match score {
        s if s >= HIGH_RISK_SCORE => RiskTier::High,
        s if s >= MEDIUM_RISK_SCORE => RiskTier::Medium,
        _ => RiskTier::Low,
    }
}

/// `clamp(round(72 + score / 4), 65, 97)`. A non-finite score gives the
/// minimum confidence.
pub fn confidence(score: f64) -> u8 {
    let raw = round_half_up(72.0 + score / 4.0);
    if raw.is_nan() {
        return MIN_CONFIDENCE;
    }
    raw.clamp(f64::from(MIN_CONFIDENCE), f64::from(MAX_CONFIDENCE)) as u8
}

pub fn assess(humidity: f64, rainfall: f64, soil_moisture: f64) -> RiskAssessment {
    let s = score(humidity, rainfall, soil_moisture);
    RiskAssessment {
        risk: tier(s),
        confidence_percent: confidence(s),
    }
}

/// Rounds halves towards positive infinity, so `2.5 → 3` and `-2.5 → -2`.
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(tier(100.0), RiskTier::High);
        assert_eq!(tier(70.0), RiskTier::High);
        assert_eq!(tier(69.999), RiskTier::Medium);
        assert_eq!(tier(45.0), RiskTier::Medium);
        assert_eq!(tier(44.999), RiskTier::Low);
        assert_eq!(tier(0.0), RiskTier::Low);
        assert_eq!(tier(f64::NAN), RiskTier::Low);
    }

    #[test]
    fn test_maximum_inputs() {
        let s = score(100.0, 500.0, 100.0);
        assert!((s - 200.0).abs() < 1e-9);

        let result = assess(100.0, 500.0, 100.0);
        assert_eq!(result.risk, RiskTier::High);
        assert_eq!(result.confidence_percent, 97);
    }

    #[test]
    fn test_zero_inputs() {
        assert_eq!(score(0.0, 0.0, 0.0), 0.0);

        let result = assess(0.0, 0.0, 0.0);
        assert_eq!(result.risk, RiskTier::Low);
        assert_eq!(result.confidence_percent, 72);
    }

    #[test]
    fn test_medium_band() {
        // 60*0.45 + 20*0.25 + 50*0.30 = 27 + 5 + 15 = 47
        let result = assess(60.0, 20.0, 50.0);
        assert_eq!(result.risk, RiskTier::Medium);
        // 72 + 47/4 = 83.75
        assert_eq!(result.confidence_percent, 84);
    }

    #[test]
    fn test_confidence_rounds_half_up_and_clamps() {
        // 72 + 2/4 = 72.5
        assert_eq!(confidence(2.0), 73);
        assert_eq!(confidence(-1000.0), MIN_CONFIDENCE);
        assert_eq!(confidence(1000.0), MAX_CONFIDENCE);
        assert_eq!(confidence(f64::NAN), MIN_CONFIDENCE);
        assert_eq!(confidence(f64::INFINITY), MAX_CONFIDENCE);
    }

    #[test]
    fn test_nan_input_is_low_with_floor_confidence() {
        let result = assess(f64::NAN, 10.0, 10.0);
        assert_eq!(result.risk, RiskTier::Low);
        assert_eq!(result.confidence_percent, MIN_CONFIDENCE);
    }

    #[test]
    fn test_from_label() {
        assert_eq!(RiskTier::from_label("High"), RiskTier::High);
        assert_eq!(RiskTier::from_label(" medium "), RiskTier::Medium);
        assert_eq!(RiskTier::from_label("LOW"), RiskTier::Low);
        assert_eq!(RiskTier::from_label("severe"), RiskTier::Low);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(2.49), 2.0);
        assert_eq!(round_half_up(-2.5), -2.0);
    }
}
