//! Training metrics derived from decoded messages.
//!
//! [`aggregator`] folds one decode pass into [`ActivityMetrics`] and
//! [`LapMetrics`], scoring each with the Banister TRIMP from [`trimp`] when an
//! [`AthleteConfig`] is supplied. [`load`] then tracks acute and chronic load
//! over a series of dated loads, from which [`readiness`] scores how fresh the
//! athlete is.

pub mod aggregator;
pub mod athlete;
pub mod load;
pub mod readiness;
pub mod trimp;

pub use aggregator::{
    ActivityAggregator, ActivityMetrics, Aggregate, AggregatorOptions, LapMetrics, ZoneMinutes,
    aggregate,
};
pub use athlete::{AthleteConfig, ConfigError, Sex, ZoneBoundary};
pub use load::{LoadError, LoadSample, LoadState, LoadTracker, daily_totals};
pub use readiness::{ReadinessMetrics, ReadinessPolicy};
pub use trimp::{ScoreStatus, training_load, trimp};
