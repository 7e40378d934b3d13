//! Readiness scoring from recent load history.
//!
//! The score blends three components on a 0 to 100 scale: a recovery score
//! from the training stress balance, a fatigue component from the average
//! daily load over the past week, and a component penalising recent hard
//! days. Every constant involved lives in [`ReadinessPolicy`].

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{
    athlete::ConfigError,
    load::{LoadSample, LoadState},
};

/// Days covered by the readiness window, including `as_of`.
pub const WINDOW_DAYS: u64 = 7;

/// Weights and scales for the readiness score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessPolicy {
    pub tsb_weight: f64,
    pub fatigue_weight: f64,
    pub hard_day_weight: f64,
    /// Recovery points per unit of TSB either side of 50.
    pub tsb_scale: f64,
    /// Average daily load at which the fatigue component reaches zero.
    pub fatigue_ceiling: f64,
    /// Daily load from which a day counts as hard.
    pub hard_day_load: f64,
    /// Hard days in the window at which the hard-day component reaches zero.
    pub max_hard_days: u32,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            tsb_weight: 0.5,
            fatigue_weight: 0.3,
            hard_day_weight: 0.2,
            tsb_scale: 2.0,
            fatigue_ceiling: 100.0,
            hard_day_load: 100.0,
            max_hard_days: 3,
        }
    }
}

impl ReadinessPolicy {
    /// Parse and validate a policy from JSON. Missing keys take their defaults.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let policy: Self = serde_json::from_str(s)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            ("tsb_weight", self.tsb_weight),
            ("fatigue_weight", self.fatigue_weight),
            ("hard_day_weight", self.hard_day_weight),
            ("tsb_scale", self.tsb_scale),
            ("fatigue_ceiling", self.fatigue_ceiling),
            ("hard_day_load", self.hard_day_load),
        ];

        for (name, v) in values {
            if !v.is_finite() || v < 0.0 {
                Err(ConfigError::NotNonNegative(name))?;
            }
        }

        Ok(())
    }
}

/// A readiness snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessMetrics {
    /// Overall readiness, 0 to 100.
    pub score: u8,
    pub fatigue_7day_avg: f64,
    pub recovery_score: f64,
    pub training_load_7day: f64,
    pub recent_hard_days: u32,
    pub days_until_race: Option<u32>,
}

impl ReadinessMetrics {
    /// Score readiness on `as_of` from the samples in `history`.
    ///
    /// Only samples dated within the seven days ending on `as_of` count;
    /// `history` need not be sorted.
    pub fn compute(
        history: &[LoadSample],
        state: LoadState,
        as_of: NaiveDate,
        policy: &ReadinessPolicy,
        race_date: Option<NaiveDate>,
    ) -> Self {
        let since = as_of
            .checked_sub_days(Days::new(WINDOW_DAYS - 1))
            .unwrap_or(NaiveDate::MIN);

        let mut daily = BTreeMap::<NaiveDate, f64>::new();
        for sample in history {
            if (since..=as_of).contains(&sample.date) {
                *daily.entry(sample.date).or_default() += sample.load;
            }
        }

        let training_load_7day: f64 = daily.values().sum();
        let fatigue_7day_avg = training_load_7day / WINDOW_DAYS as f64;
        let recent_hard_days = daily
            .values()
            .filter(|&&load| load >= policy.hard_day_load)
            .count() as u32;

        let recovery_score = (50.0 + state.tsb * policy.tsb_scale).clamp(0.0, 100.0);
        let fatigue = 100.0 * (1.0 - saturate(fatigue_7day_avg, policy.fatigue_ceiling));
        let hard_days = 100.0
            * (1.0 - saturate(recent_hard_days as f64, policy.max_hard_days as f64));

        // All-zero weights score on recovery alone.
        let weights = policy.tsb_weight + policy.fatigue_weight + policy.hard_day_weight;
        let score = if weights > 0.0 {
            (recovery_score * policy.tsb_weight
                + fatigue * policy.fatigue_weight
                + hard_days * policy.hard_day_weight)
                / weights
        } else {
            recovery_score
        };

        let days_until_race = race_date
            .filter(|&race| race >= as_of)
            .map(|race| (race - as_of).num_days() as u32);

        Self {
            score: score.clamp(0.0, 100.0).round() as u8,
            fatigue_7day_avg,
            recovery_score,
            training_load_7day,
            recent_hard_days,
            days_until_race,
        }
    }
}

/// `value / ceiling` capped at one, with a zero ceiling saturating anything
/// positive.
fn saturate(value: f64, ceiling: f64) -> f64 {
    if ceiling > 0.0 {
        (value / ceiling).min(1.0)
    } else if value > 0.0 {
        1.0
    } else {
        0.0
    }
}
