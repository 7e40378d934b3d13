//! Rolling acute and chronic training load.
//!
//! Each applied sample moves the state forward with exponentially weighted
//! averages over 7 days (ATL) and 28 days (CTL), decayed by the number of days
//! since the previous sample. Samples must arrive in non-decreasing date order.

use std::collections::{BTreeMap, VecDeque};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use super::readiness::{ReadinessMetrics, ReadinessPolicy};

/// Time constant of the acute load, in days.
pub const ATL_DAYS: f64 = 7.0;
/// Time constant of the chronic load, in days.
pub const CTL_DAYS: f64 = 28.0;
/// Days of samples retained for readiness.
pub const HISTORY_DAYS: u64 = 28;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    /// A sample dated before the last applied one.
    #[error("Sample dated {date} precedes the last applied sample ({last}).")]
    NonChronologicalSample { date: NaiveDate, last: NaiveDate },
}

/// Training stress state after the latest sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadState {
    pub atl: f64,
    pub ctl: f64,
    /// Always `ctl - atl`.
    pub tsb: f64,
}

impl LoadState {
    fn new(atl: f64, ctl: f64) -> Self {
        Self {
            atl,
            ctl,
            tsb: ctl - atl,
        }
    }
}

/// A dated training load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadSample {
    pub date: NaiveDate,
    pub load: f64,
}

impl LoadSample {
    pub fn new(date: NaiveDate, load: f64) -> Self {
        Self { date, load }
    }
}

/// Sum samples sharing a date, in date order.
pub fn daily_totals(samples: &[LoadSample]) -> Vec<LoadSample> {
    let mut days = BTreeMap::<NaiveDate, f64>::new();
    for s in samples {
        *days.entry(s.date).or_default() += s.load;
    }
    days.into_iter()
        .map(|(date, load)| LoadSample { date, load })
        .collect()
}

/// ATL/CTL/TSB tracker for one athlete.
#[derive(Debug, Clone, Default)]
pub struct LoadTracker {
    state: LoadState,
    last: Option<NaiveDate>,
    history: VecDeque<LoadSample>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a state persisted as of `date`.
    pub fn with_state(date: NaiveDate, state: LoadState) -> Self {
        Self {
            state: LoadState::new(state.atl, state.ctl),
            last: Some(date),
            history: VecDeque::new(),
        }
    }

    /// Current state. Does not mutate.
    pub fn snapshot(&self) -> LoadState {
        self.state
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.last
    }

    /// Samples from the last 28 days, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &LoadSample> {
        self.history.iter()
    }

    /// Ingest one sample.
    ///
    /// The first sample sets both loads to its value. Later samples decay the
    /// state by the whole days elapsed; a sample on the same date as the last
    /// leaves ATL and CTL unchanged but still counts towards readiness.
    pub fn apply(&mut self, date: NaiveDate, load: f64) -> Result<LoadState, LoadError> {
        self.state = match self.last {
            None => LoadState::new(load, load),
            Some(last) if date < last => {
                return Err(LoadError::NonChronologicalSample { date, last });
            }
            Some(last) => {
                let days = (date - last).num_days() as f64;
                LoadState::new(
                    decay(self.state.atl, load, days, ATL_DAYS),
                    decay(self.state.ctl, load, days, CTL_DAYS),
                )
            }
        };
        self.last = Some(date);

        self.history.push_back(LoadSample { date, load });
        let horizon = date.checked_sub_days(Days::new(HISTORY_DAYS));
        while let (Some(front), Some(horizon)) = (self.history.front(), horizon) {
            if front.date > horizon {
                break;
            }
            self.history.pop_front();
        }

        trace!(%date, load, atl = self.state.atl, ctl = self.state.ctl, "load applied");
        Ok(self.state)
    }

    /// Ingest samples in order, stopping at the first out of order.
    pub fn apply_all(&mut self, samples: &[LoadSample]) -> Result<LoadState, LoadError> {
        for s in samples {
            self.apply(s.date, s.load)?;
        }
        Ok(self.state)
    }

    /// Readiness on `as_of` from the retained history and current state.
    pub fn readiness(
        &self,
        as_of: NaiveDate,
        policy: &ReadinessPolicy,
        race_date: Option<NaiveDate>,
    ) -> ReadinessMetrics {
        let history: Vec<LoadSample> = self.history.iter().copied().collect();
        ReadinessMetrics::compute(&history, self.state, as_of, policy, race_date)
    }
}

fn decay(prior: f64, load: f64, days: f64, constant: f64) -> f64 {
    let k = (-days / constant).exp();
    prior * k + load * (1.0 - k)
}
