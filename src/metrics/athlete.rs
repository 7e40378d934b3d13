//! Athlete physiology needed for zone bucketing and training load.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration text was not valid JSON for the expected shape.
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// Resting heart rate not below maximum.
    #[error("Resting heart rate ({resting}) must be below maximum heart rate ({max}).")]
    HeartRateRange { resting: f64, max: f64 },
    /// A zone whose bounds are reversed, or that starts below its predecessor.
    #[error("Zone {zone} boundaries are out of order.")]
    ZoneOrder { zone: usize },
    /// A value that must be finite and non-negative was not.
    #[error("{0} must be a finite, non-negative number.")]
    NotNonNegative(&'static str),
}

/// Sex, selecting the exponential weighting of the Banister TRIMP formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    #[default]
    Male,
    Female,
}

impl Sex {
    /// Exponent `k` in `ratio * e^(k * ratio)`.
    pub fn trimp_factor(self) -> f64 {
        match self {
            Self::Male => 1.92,
            Self::Female => 1.67,
        }
    }
}

/// One heart-rate zone, as fractions of heart-rate reserve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneBoundary {
    pub min_fraction: f64,
    pub max_fraction: f64,
}

impl ZoneBoundary {
    pub const fn new(min_fraction: f64, max_fraction: f64) -> Self {
        Self {
            min_fraction,
            max_fraction,
        }
    }
}

/// Five zones at 50, 60, 70, 80 and 90 percent of heart-rate reserve.
pub const DEFAULT_ZONES: [ZoneBoundary; 5] = [
    ZoneBoundary::new(0.5, 0.6),
    ZoneBoundary::new(0.6, 0.7),
    ZoneBoundary::new(0.7, 0.8),
    ZoneBoundary::new(0.8, 0.9),
    ZoneBoundary::new(0.9, 1.0),
];

fn default_zones() -> [ZoneBoundary; 5] {
    DEFAULT_ZONES
}

/// Heart-rate profile of one athlete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteConfig {
    pub resting_hr: f64,
    pub max_hr: f64,
    #[serde(default)]
    pub sex: Sex,
    #[serde(default = "default_zones")]
    pub zones: [ZoneBoundary; 5],
}

impl AthleteConfig {
    pub fn new(resting_hr: f64, max_hr: f64, sex: Sex) -> Self {
        Self {
            resting_hr,
            max_hr,
            sex,
            zones: DEFAULT_ZONES,
        }
    }

    /// Parse and validate a configuration from JSON.
    ///
    /// ```
    /// let athlete = AthleteConfig::from_json(r#"{"resting_hr": 50, "max_hr": 190}"#)?;
    /// ```
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, v) in [("resting_hr", self.resting_hr), ("max_hr", self.max_hr)] {
            if !v.is_finite() || v < 0.0 {
                Err(ConfigError::NotNonNegative(name))?;
            }
        }

        if self.resting_hr >= self.max_hr {
            Err(ConfigError::HeartRateRange {
                resting: self.resting_hr,
                max: self.max_hr,
            })?;
        }

        let mut floor = f64::NEG_INFINITY;
        for (i, zone) in self.zones.iter().enumerate() {
            if zone.min_fraction > zone.max_fraction || zone.min_fraction < floor {
                Err(ConfigError::ZoneOrder { zone: i + 1 })?;
            }
            floor = zone.min_fraction;
        }

        Ok(())
    }

    /// Fraction of heart-rate reserve, clamped to `[0, 1]`.
    pub fn hr_ratio(&self, hr: f64) -> f64 {
        ((hr - self.resting_hr) / (self.max_hr - self.resting_hr)).clamp(0.0, 1.0)
    }

    /// Zero-based zone index for an instantaneous heart rate.
    ///
    /// Rates below zone 1 count as zone 1 and rates above zone 5 as zone 5. A
    /// rate falling in a gap between zones belongs to the zone below it.
    pub fn zone_of(&self, hr: f64) -> usize {
        let fraction = (hr - self.resting_hr) / (self.max_hr - self.resting_hr);
        self.zones
            .iter()
            .rposition(|z| fraction >= z.min_fraction)
            .unwrap_or(0)
    }
}
