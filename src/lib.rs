//! A decoder for Garmin's Flexible and Interoperable Data Transfer protocol,
//! and the training-load metrics computed from what it decodes.
//!
//! Paceline is split in layers. The [`sans`] module describes the wire format
//! and holds no state; [`decode`] runs a forgiving state machine over a
//! buffer held in memory, scaling fields through the [`profile`]; and
//! [`metrics`] turns decoded messages into per-activity metrics and tracks
//! training stress over time.
//!
//! ```
//! use paceline::metrics::{AthleteConfig, LoadTracker, Sex};
//!
//! let bytes = std::fs::read("morning-run.fit")?;
//! let result = paceline::decode(&bytes)?;
//!
//! let athlete = AthleteConfig::new(50.0, 190.0, Sex::Female);
//! let aggregate = paceline::metrics::aggregate(&result.messages, Some(&athlete));
//!
//! let mut tracker = LoadTracker::new();
//! for activity in &aggregate.activities {
//!     if let (Some(date), Some(load)) = (activity.date, activity.training_load) {
//!         tracker.apply(date.date_naive(), load)?;
//!     }
//! }
//! ```
//!
//! The crate logs through [`tracing`] and never installs a subscriber.

pub mod decode;
pub mod metrics;
pub mod profile;
pub mod sans;

pub use decode::{DecodeError, DecodeResult, DecodedMessage, Value, decode};
