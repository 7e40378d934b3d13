//! Banister training impulse.
//!
//! `TRIMP = minutes * ratio * e^(k * ratio)`, where `ratio` is the fraction of
//! heart-rate reserve at the average heart rate and `k` is 1.92 for men and
//! 1.67 for women.

use serde::{Deserialize, Serialize};

use super::athlete::AthleteConfig;

/// Heart-rate reserve fraction assumed when no heart rate was recorded.
pub const FALLBACK_HR_RATIO: f64 = 0.5;

/// How much a training load can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStatus {
    /// Computed from recorded heart rate.
    #[default]
    Scored,
    /// Estimated from duration alone.
    LowConfidence,
    /// No athlete configuration; zones and load were not computed.
    Unscored,
}

/// Training impulse for a bout at a given average heart rate.
pub fn trimp(duration_min: f64, avg_hr: f64, athlete: &AthleteConfig) -> f64 {
    impulse(duration_min, athlete.hr_ratio(avg_hr), athlete)
}

/// Training load for a bout, falling back to a duration-only estimate at a
/// moderate intensity when no heart rate is available.
pub fn training_load(
    duration_min: f64,
    avg_hr: Option<f64>,
    athlete: &AthleteConfig,
) -> (f64, ScoreStatus) {
    match avg_hr {
        Some(hr) => (trimp(duration_min, hr, athlete), ScoreStatus::Scored),
        None => (
            impulse(duration_min, FALLBACK_HR_RATIO, athlete),
            ScoreStatus::LowConfidence,
        ),
    }
}

fn impulse(duration_min: f64, ratio: f64, athlete: &AthleteConfig) -> f64 {
    let k = athlete.sex.trimp_factor();
    duration_min.max(0.0) * ratio * (k * ratio).exp()
}
