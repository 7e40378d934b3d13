//! Folding decoded messages into activity and lap metrics.
//!
//! Record messages are buffered as samples. A Lap message closes a lap over
//! the samples not yet claimed by an earlier lap, narrowed to its time window
//! when it carries one. A Session message closes an activity the same way,
//! adopts the laps that started inside it, and closes an implicit lap over
//! any records left after the last Lap message. Summary fields written
//! by the device (timer time, distance, calories, ascent) take precedence over
//! values derived from samples, which serve as the fallback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    athlete::AthleteConfig,
    trimp::{ScoreStatus, training_load},
};
use crate::{
    decode::DecodedMessage,
    profile::{self, MessageKind},
};

/// Tolerance, in minutes, for zone time exceeding activity duration.
pub const ZONE_EPSILON_MIN: f64 = 0.01;

/// Smallest amount of heart-rate data, in seconds, for a drift figure.
pub const MIN_DRIFT_SECS: f64 = 180.0;

/// Rolling window, in samples, for normalized power.
const NP_WINDOW: usize = 30;

/// Tuning for sample aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorOptions {
    /// Gaps between samples longer than this are pauses, contributing neither
    /// moving time nor zone time.
    pub max_sample_gap_secs: u32,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            max_sample_gap_secs: 60,
        }
    }
}

/// Minutes spent in each heart-rate zone.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ZoneMinutes {
    pub zone1: f64,
    pub zone2: f64,
    pub zone3: f64,
    pub zone4: f64,
    pub zone5: f64,
}

impl ZoneMinutes {
    fn from_secs(secs: [f64; 5]) -> Self {
        let [zone1, zone2, zone3, zone4, zone5] = secs.map(|s| s / 60.0);
        Self {
            zone1,
            zone2,
            zone3,
            zone4,
            zone5,
        }
    }

    pub fn total(&self) -> f64 {
        self.zone1 + self.zone2 + self.zone3 + self.zone4 + self.zone5
    }
}

/// Metrics for one activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetrics {
    /// FIT start time of the activity, in seconds; laps refer back to it.
    pub activity_id: u32,
    pub date: Option<DateTime<Utc>>,
    pub sport: String,
    pub duration_min: f64,
    pub distance_km: f64,
    pub avg_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub hr_drift_pct: Option<f64>,
    /// Absent when the activity is [`ScoreStatus::Unscored`].
    pub zone_minutes: Option<ZoneMinutes>,
    /// TRIMP. Absent when the activity is [`ScoreStatus::Unscored`].
    pub training_load: Option<f64>,
    pub status: ScoreStatus,
    pub calories: Option<f64>,
    pub ascent_m: Option<f64>,
    pub descent_m: Option<f64>,
    pub avg_speed_mps: Option<f64>,
    pub max_speed_mps: Option<f64>,
    pub avg_pace_min_per_km: Option<f64>,
    pub avg_power: Option<f64>,
    pub max_power: Option<f64>,
    pub normalized_power: Option<f64>,
    pub lap_count: usize,
}

/// Metrics for one lap, scoped to the lap's time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapMetrics {
    /// The parent's [`ActivityMetrics::activity_id`].
    pub activity_id: u32,
    /// The parent's [`ActivityMetrics::date`].
    pub activity_date: Option<DateTime<Utc>>,
    /// Position within the parent activity, from zero.
    pub lap_index: usize,
    pub start: Option<DateTime<Utc>>,
    pub duration_min: f64,
    pub distance_km: f64,
    pub avg_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub zone_minutes: Option<ZoneMinutes>,
    pub training_load: Option<f64>,
    pub status: ScoreStatus,
    pub calories: Option<f64>,
    pub ascent_m: Option<f64>,
    pub descent_m: Option<f64>,
    pub avg_speed_mps: Option<f64>,
    pub avg_pace_min_per_km: Option<f64>,
    pub avg_power: Option<f64>,
    pub max_power: Option<f64>,
    /// Whether the lap was closed without a Lap message.
    pub implicit: bool,
}

/// Everything aggregated from one decode pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregate {
    pub activities: Vec<ActivityMetrics>,
    pub laps: Vec<LapMetrics>,
    pub warnings: Vec<String>,
}

/// Aggregate a whole message sequence.
pub fn aggregate(messages: &[DecodedMessage], athlete: Option<&AthleteConfig>) -> Aggregate {
    let mut aggregator = ActivityAggregator::new(athlete);
    for message in messages {
        aggregator.push(message);
    }
    aggregator.finish()
}

#[derive(Debug, Clone, Copy, Default)]
struct Sample {
    timestamp: Option<u32>,
    heart_rate: Option<f64>,
    speed: Option<f64>,
    power: Option<f64>,
    distance: Option<f64>,
    altitude: Option<f64>,
}

impl Sample {
    fn from_record(m: &DecodedMessage) -> Self {
        Self {
            timestamp: m.timestamp,
            heart_rate: m.f64("heart_rate"),
            speed: m.f64("enhanced_speed").or_else(|| m.f64("speed")),
            power: m.f64("power"),
            distance: m.f64("distance"),
            altitude: m.f64("enhanced_altitude").or_else(|| m.f64("altitude")),
        }
    }
}

/// A lap closed before its activity, awaiting the activity's identity.
#[derive(Debug)]
struct PendingLap {
    start: Option<u32>,
    metrics: LapMetrics,
}

/// Incremental aggregator over the messages of one decode pass.
#[derive(Debug)]
pub struct ActivityAggregator<'a> {
    athlete: Option<&'a AthleteConfig>,
    options: AggregatorOptions,
    samples: Vec<Sample>,
    /// First sample not yet claimed by a closed activity.
    cursor: usize,
    /// First sample not yet claimed by a closed lap. Never behind `cursor`.
    lap_cursor: usize,
    pending_laps: Vec<PendingLap>,
    output: Aggregate,
}

impl<'a> ActivityAggregator<'a> {
    /// Without an athlete configuration, activities are left unscored.
    pub fn new(athlete: Option<&'a AthleteConfig>) -> Self {
        Self {
            athlete,
            options: AggregatorOptions::default(),
            samples: Vec::new(),
            cursor: 0,
            lap_cursor: 0,
            pending_laps: Vec::new(),
            output: Aggregate::default(),
        }
    }

    pub fn with_options(mut self, options: AggregatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn push(&mut self, message: &DecodedMessage) {
        match message.kind {
            MessageKind::Record => self.samples.push(Sample::from_record(message)),
            MessageKind::Lap => self.close_lap(message),
            MessageKind::Session => self.close_activity(Some(message)),
            MessageKind::Activity if self.cursor < self.samples.len() => {
                self.close_activity(Some(message))
            }
            _ => {}
        }
    }

    /// Close anything still open and return the metrics.
    pub fn finish(mut self) -> Aggregate {
        if self.cursor < self.samples.len() {
            self.warn("Records without a session message; metrics derived from records.".into());
            self.close_activity(None);
        }

        if !self.pending_laps.is_empty() {
            self.warn(format!(
                "{} laps outside any activity were dropped.",
                self.pending_laps.len()
            ));
        }

        self.output
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.output.warnings.push(message);
    }

    /// Indices of samples from `from` onwards inside a message's time window.
    /// Without both bounds every such sample is inside.
    fn window(&self, from: usize, message: Option<&DecodedMessage>) -> Vec<usize> {
        let bounds = message.and_then(|m| Some((m.time("start_time")?, m.timestamp?)));

        (from..self.samples.len())
            .filter(|&i| match (bounds, self.samples[i].timestamp) {
                (Some((start, end)), Some(t)) => (start..=end).contains(&t),
                _ => true,
            })
            .collect()
    }

    fn summarise(&self, indices: &[usize], message: Option<&DecodedMessage>) -> Summary {
        let samples = indices.iter().map(|&i| &self.samples[i]);
        Summary::new(samples, message, self.athlete, &self.options)
    }

    fn close_lap(&mut self, message: &DecodedMessage) {
        let indices = self.window(self.lap_cursor, Some(message));
        let summary = self.summarise(&indices, Some(message));
        let start = message.time("start_time").or(summary.start);

        if let Some(&last) = indices.last() {
            self.lap_cursor = last + 1;
        }

        debug!(samples = indices.len(), duration_min = summary.duration_min, "lap");
        self.check_zones(&summary, "lap");

        self.pending_laps.push(PendingLap {
            start,
            metrics: summary.into_lap(start, false),
        });
    }

    fn close_activity(&mut self, message: Option<&DecodedMessage>) {
        let indices = self.window(self.cursor, message);
        let summary = self.summarise(&indices, message);
        let start = message.and_then(|m| m.time("start_time")).or(summary.start);
        let end = message.and_then(|m| m.timestamp);

        let (mut laps, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending_laps)
                .into_iter()
                .partition(|lap| match (start, end, lap.start) {
                    (Some(s), Some(e), Some(l)) => (s..=e).contains(&l),
                    _ => true,
                });
        self.pending_laps = rest;

        // Records after the last lap close an implicit one.
        let trailing: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i >= self.lap_cursor)
            .collect();

        if !trailing.is_empty() {
            let (lap, lap_start) = if laps.is_empty() && trailing.len() == indices.len() {
                (summary.clone(), start)
            } else {
                let lap = self.summarise(&trailing, None);
                let lap_start = lap.start;
                (lap, lap_start)
            };
            laps.push(PendingLap {
                start: lap_start,
                metrics: lap.into_lap(lap_start, true),
            });
        }

        if let Some(&last) = indices.last() {
            self.cursor = last + 1;
        }
        self.lap_cursor = self.lap_cursor.max(self.cursor);

        self.check_zones(&summary, "activity");

        let activity_id = start.unwrap_or_default();
        let sport = message
            .and_then(|m| m.u64("sport"))
            .map_or("generic", profile::sport_name);
        let activity = summary.into_activity(activity_id, sport, laps.len());

        debug!(
            activity_id,
            sport,
            duration_min = activity.duration_min,
            laps = laps.len(),
            "activity"
        );

        for (lap_index, PendingLap { metrics, .. }) in laps.into_iter().enumerate() {
            self.output.laps.push(LapMetrics {
                activity_id,
                activity_date: activity.date,
                lap_index,
                ..metrics
            });
        }

        self.output.activities.push(activity);
    }

    fn check_zones(&mut self, summary: &Summary, scope: &str) {
        if let Some(zones) = summary.zone_minutes {
            if zones.total() > summary.duration_min + ZONE_EPSILON_MIN {
                self.warn(format!(
                    "Zone minutes ({:.2}) exceed {scope} duration ({:.2}).",
                    zones.total(),
                    summary.duration_min
                ));
            }
        }
    }
}

/// Figures shared by activities and laps.
#[derive(Debug, Clone)]
struct Summary {
    start: Option<u32>,
    duration_min: f64,
    distance_km: f64,
    avg_hr: Option<f64>,
    max_hr: Option<f64>,
    hr_drift_pct: Option<f64>,
    zone_minutes: Option<ZoneMinutes>,
    training_load: Option<f64>,
    status: ScoreStatus,
    calories: Option<f64>,
    ascent_m: Option<f64>,
    descent_m: Option<f64>,
    avg_speed_mps: Option<f64>,
    max_speed_mps: Option<f64>,
    avg_pace_min_per_km: Option<f64>,
    avg_power: Option<f64>,
    max_power: Option<f64>,
    normalized_power: Option<f64>,
}

impl Summary {
    fn new<'s>(
        samples: impl Iterator<Item = &'s Sample>,
        message: Option<&DecodedMessage>,
        athlete: Option<&AthleteConfig>,
        options: &AggregatorOptions,
    ) -> Self {
        let field = |name: &str| message.and_then(|m| m.f64(name));

        let mut start = None;
        let mut previous = None;
        let mut moving_secs = 0.0;
        let mut zone_secs = [0.0; 5];
        let mut hr_secs = 0.0;
        let mut hr_trace = Vec::new();
        let mut speeds = Vec::new();
        let mut powers = Vec::new();
        let mut distances = (None, None);
        let mut altitude: Option<f64> = None;
        let (mut ascent, mut descent) = (0.0, 0.0);

        for s in samples {
            let dt = match (previous, s.timestamp) {
                (Some(p), Some(t)) if t >= p && t - p <= options.max_sample_gap_secs => {
                    (t - p) as f64
                }
                _ => 0.0,
            };
            if s.timestamp.is_some() {
                start = start.or(s.timestamp);
                previous = s.timestamp;
            }
            moving_secs += dt;

            if let Some(hr) = s.heart_rate {
                hr_secs += dt;
                hr_trace.push((moving_secs, hr));
                if let Some(athlete) = athlete {
                    zone_secs[athlete.zone_of(hr)] += dt;
                }
            }

            speeds.extend(s.speed);
            powers.extend(s.power);

            if let Some(d) = s.distance {
                distances.0 = distances.0.or(Some(d));
                distances.1 = Some(d);
            }

            if let Some(a) = s.altitude {
                if let Some(prev) = altitude {
                    let delta = a - prev;
                    if delta > 0.0 {
                        ascent += delta;
                    } else {
                        descent -= delta;
                    }
                }
                altitude = Some(a);
            }
        }

        let duration_min = field("total_timer_time").unwrap_or(moving_secs) / 60.0;
        let distance_m = field("total_distance").or(match distances {
            (Some(first), Some(last)) => Some(last - first),
            _ => None,
        });

        let hrs: Vec<f64> = hr_trace.iter().map(|&(_, hr)| hr).collect();
        let avg_hr = mean(&hrs).or_else(|| field("avg_heart_rate"));
        let max_hr = max(&hrs).or_else(|| field("max_heart_rate"));
        let hr_drift_pct = (hr_secs >= MIN_DRIFT_SECS)
            .then(|| drift(&hr_trace))
            .flatten();

        let avg_speed_mps = field("enhanced_avg_speed")
            .or_else(|| field("avg_speed"))
            .or_else(|| match distance_m {
                Some(d) if moving_secs > 0.0 => Some(d / moving_secs),
                _ => mean(&speeds),
            });
        let max_speed_mps = max(&speeds)
            .or_else(|| field("enhanced_max_speed"))
            .or_else(|| field("max_speed"));

        let altitude_seen = altitude.is_some();

        let (zone_minutes, training_load, status) = match athlete {
            Some(athlete) => {
                let (load, status) = training_load(duration_min, avg_hr, athlete);
                (Some(ZoneMinutes::from_secs(zone_secs)), Some(load), status)
            }
            None => (None, None, ScoreStatus::Unscored),
        };

        Self {
            start,
            duration_min,
            distance_km: distance_m.unwrap_or(0.0) / 1000.0,
            avg_hr,
            max_hr,
            hr_drift_pct,
            zone_minutes,
            training_load,
            status,
            calories: field("total_calories"),
            ascent_m: field("total_ascent").or(altitude_seen.then_some(ascent)),
            descent_m: field("total_descent").or(altitude_seen.then_some(descent)),
            avg_speed_mps,
            max_speed_mps,
            avg_pace_min_per_km: avg_speed_mps.and_then(pace),
            avg_power: mean(&powers).or_else(|| field("avg_power")),
            max_power: max(&powers).or_else(|| field("max_power")),
            normalized_power: normalized_power(&powers),
        }
    }

    fn into_activity(self, activity_id: u32, sport: &str, lap_count: usize) -> ActivityMetrics {
        ActivityMetrics {
            activity_id,
            date: (self.start.is_some() || activity_id != 0)
                .then(|| profile::to_utc(activity_id))
                .flatten(),
            sport: sport.to_string(),
            duration_min: self.duration_min,
            distance_km: self.distance_km,
            avg_hr: self.avg_hr,
            max_hr: self.max_hr,
            hr_drift_pct: self.hr_drift_pct,
            zone_minutes: self.zone_minutes,
            training_load: self.training_load,
            status: self.status,
            calories: self.calories,
            ascent_m: self.ascent_m,
            descent_m: self.descent_m,
            avg_speed_mps: self.avg_speed_mps,
            max_speed_mps: self.max_speed_mps,
            avg_pace_min_per_km: self.avg_pace_min_per_km,
            avg_power: self.avg_power,
            max_power: self.max_power,
            normalized_power: self.normalized_power,
            lap_count,
        }
    }

    fn into_lap(self, start: Option<u32>, implicit: bool) -> LapMetrics {
        LapMetrics {
            activity_id: 0,
            activity_date: None,
            lap_index: 0,
            start: start.and_then(profile::to_utc),
            duration_min: self.duration_min,
            distance_km: self.distance_km,
            avg_hr: self.avg_hr,
            max_hr: self.max_hr,
            zone_minutes: self.zone_minutes,
            training_load: self.training_load,
            status: self.status,
            calories: self.calories,
            ascent_m: self.ascent_m,
            descent_m: self.descent_m,
            avg_speed_mps: self.avg_speed_mps,
            avg_pace_min_per_km: self.avg_pace_min_per_km,
            avg_power: self.avg_power,
            max_power: self.max_power,
            implicit,
        }
    }
}

fn mean(xs: &[f64]) -> Option<f64> {
    (!xs.is_empty()).then(|| xs.iter().sum::<f64>() / xs.len() as f64)
}

fn max(xs: &[f64]) -> Option<f64> {
    xs.iter().copied().reduce(f64::max)
}

/// Minutes per kilometre at a speed in metres per second.
fn pace(speed_mps: f64) -> Option<f64> {
    (speed_mps > 0.0).then(|| 1000.0 / (speed_mps * 60.0))
}

/// Percentage change in mean heart rate from the first to the last third of
/// the moving time.
fn drift(trace: &[(f64, f64)]) -> Option<f64> {
    let (first, last) = (trace.first()?.0, trace.last()?.0);
    let third = (last - first) / 3.0;

    let early: Vec<f64> = trace
        .iter()
        .filter(|&&(t, _)| t <= first + third)
        .map(|&(_, hr)| hr)
        .collect();
    let late: Vec<f64> = trace
        .iter()
        .filter(|&&(t, _)| t >= last - third)
        .map(|&(_, hr)| hr)
        .collect();

    let (early, late) = (mean(&early)?, mean(&late)?);
    (early > 0.0).then(|| (late - early) / early * 100.0)
}

/// Fourth root of the mean fourth power of the rolling 30-sample mean.
fn normalized_power(powers: &[f64]) -> Option<f64> {
    if powers.len() < NP_WINDOW {
        return None;
    }

    let rolling: Vec<f64> = powers
        .windows(NP_WINDOW)
        .map(|w| w.iter().sum::<f64>() / NP_WINDOW as f64)
        .collect();

    mean(&rolling.iter().map(|p| p.powi(4)).collect::<Vec<_>>()).map(|m| m.powf(0.25))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_compares_thirds() {
        let trace: Vec<(f64, f64)> = (0..=9).map(|i| (i as f64 * 60.0, 120.0 + i as f64)).collect();
        // early: t <= 180 → 120..=123, late: t >= 360 → 126..=129
        let d = drift(&trace).unwrap();
        assert!((d - (127.5 - 121.5) / 121.5 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn constant_power_normalizes_to_itself() {
        let powers = vec![200.0; 45];
        assert!((normalized_power(&powers).unwrap() - 200.0).abs() < 1e-9);
        assert_eq!(normalized_power(&powers[..29]), None);
    }

    #[test]
    fn pace_from_speed() {
        assert!((pace(1000.0 / 300.0).unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(pace(0.0), None);
    }
}
