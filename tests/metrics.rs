mod support;

use paceline::{
    DecodedMessage, Value,
    metrics::{
        ActivityAggregator, AggregatorOptions, AthleteConfig, ScoreStatus, Sex, aggregate, trimp,
    },
    profile::{self, MessageKind},
};
use support::*;

const START: u32 = 1_000_000_000;

fn athlete() -> AthleteConfig {
    AthleteConfig::new(50.0, 190.0, Sex::Male)
}

fn record(t: u32, hr: Option<u64>, distance: f64) -> DecodedMessage {
    let m = DecodedMessage::new(MessageKind::Record)
        .with("timestamp", Value::Unsigned(t as u64))
        .with("distance", Value::Float(distance))
        .with("speed", Value::Float(3.0))
        .with("altitude", Value::Float(100.0 + (t - START) as f64 / 10.0));
    match hr {
        Some(hr) => m.with("heart_rate", Value::Unsigned(hr)),
        None => m,
    }
}

/// Ten minutes of running at 3 m/s, one record every ten seconds.
fn steady_run(from: u32, hr: Option<u64>) -> Vec<DecodedMessage> {
    (0..=60)
        .map(|i| record(from + i * 10, hr, i as f64 * 30.0))
        .collect()
}

fn boundary(kind: MessageKind, start: u32, end: u32) -> DecodedMessage {
    DecodedMessage::new(kind)
        .with("timestamp", Value::Unsigned(end as u64))
        .with("start_time", Value::Unsigned(start as u64))
}

#[test]
fn trimp_reference_value() {
    let ratio = 100.0 / 140.0;
    let expected = 60.0 * ratio * (1.92f64 * ratio).exp();

    let load = trimp(60.0, 150.0, &athlete());
    assert!((load - expected).abs() < 1e-9);
    assert!((load - 168.9).abs() < 0.1);
}

#[test]
fn trimp_increases_with_heart_rate() {
    for sex in [Sex::Male, Sex::Female] {
        let athlete = AthleteConfig::new(50.0, 190.0, sex);
        let loads: Vec<f64> = (51..=190).map(|hr| trimp(45.0, hr as f64, &athlete)).collect();
        assert!(loads.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn aggregate_single_session() {
    let mut messages = steady_run(START, Some(150));
    messages.push(boundary(MessageKind::Lap, START, START + 600));
    messages.push(
        boundary(MessageKind::Session, START, START + 600).with("sport", Value::Unsigned(1)),
    );

    let out = aggregate(&messages, Some(&athlete()));
    assert!(out.warnings.is_empty());
    assert_eq!(out.activities.len(), 1);
    assert_eq!(out.laps.len(), 1);

    let activity = &out.activities[0];
    assert_eq!(activity.activity_id, START);
    assert_eq!(activity.date, profile::to_utc(START));
    assert_eq!(activity.sport, "running");
    assert!((activity.duration_min - 10.0).abs() < 1e-9);
    assert!((activity.distance_km - 1.8).abs() < 1e-9);
    assert_eq!(activity.avg_hr, Some(150.0));
    assert_eq!(activity.max_hr, Some(150.0));
    assert_eq!(activity.hr_drift_pct, Some(0.0));
    assert_eq!(activity.status, ScoreStatus::Scored);
    assert_eq!(activity.lap_count, 1);

    let zones = activity.zone_minutes.unwrap();
    assert!((zones.zone3 - 10.0).abs() < 1e-9);
    assert_eq!(zones.zone1 + zones.zone2 + zones.zone4 + zones.zone5, 0.0);

    let expected = trimp(10.0, 150.0, &athlete());
    assert!((activity.training_load.unwrap() - expected).abs() < 1e-9);

    assert!((activity.avg_speed_mps.unwrap() - 3.0).abs() < 1e-9);
    assert!((activity.avg_pace_min_per_km.unwrap() - 1000.0 / 180.0).abs() < 1e-9);
    assert!((activity.ascent_m.unwrap() - 60.0).abs() < 1e-9);
    assert_eq!(activity.descent_m, Some(0.0));

    let lap = &out.laps[0];
    assert_eq!(lap.activity_id, START);
    assert_eq!(lap.activity_date, activity.date);
    assert_eq!(lap.lap_index, 0);
    assert!(!lap.implicit);
    assert!((lap.duration_min - 10.0).abs() < 1e-9);
}

#[test]
fn session_summary_takes_precedence() {
    let mut messages = steady_run(START, Some(150));
    messages.push(
        boundary(MessageKind::Session, START, START + 600)
            .with("total_timer_time", Value::Float(720.0))
            .with("total_distance", Value::Float(2000.0))
            .with("total_calories", Value::Unsigned(140))
            .with("total_ascent", Value::Unsigned(12)),
    );

    let out = aggregate(&messages, Some(&athlete()));
    let activity = &out.activities[0];
    assert_eq!(activity.duration_min, 12.0);
    assert_eq!(activity.distance_km, 2.0);
    assert_eq!(activity.calories, Some(140.0));
    assert_eq!(activity.ascent_m, Some(12.0));
}

#[test]
fn laps_split_by_window() {
    let mut messages = steady_run(START, Some(120));
    messages.push(boundary(MessageKind::Lap, START, START + 300));
    messages.push(boundary(MessageKind::Lap, START + 310, START + 600));
    messages.push(boundary(MessageKind::Session, START, START + 600));

    let out = aggregate(&messages, Some(&athlete()));
    assert_eq!(out.activities[0].lap_count, 2);

    let indices: Vec<_> = out.laps.iter().map(|l| l.lap_index).collect();
    assert_eq!(indices, [0, 1]);
    assert!((out.laps[0].duration_min - 5.0).abs() < 1e-9);
    assert!((out.laps[1].duration_min - 290.0 / 60.0).abs() < 1e-9);
    assert_eq!(out.laps[1].start, profile::to_utc(START + 310));
}

#[test]
fn back_to_back_activities() {
    let second = START + 3600;

    let mut messages = steady_run(START, Some(140));
    messages.push(boundary(MessageKind::Lap, START, START + 600));
    messages.push(boundary(MessageKind::Session, START, START + 600));
    messages.extend(steady_run(second, Some(160)));
    messages.push(boundary(MessageKind::Lap, second, second + 600));
    messages.push(boundary(MessageKind::Session, second, second + 600));

    let out = aggregate(&messages, Some(&athlete()));
    assert_eq!(out.activities.len(), 2);
    assert_eq!(out.activities[1].activity_id, second);
    assert_eq!(out.activities[1].avg_hr, Some(160.0));

    let owners: Vec<_> = out.laps.iter().map(|l| (l.activity_id, l.lap_index)).collect();
    assert_eq!(owners, [(START, 0), (second, 0)]);
}

#[test]
fn implicit_lap_without_lap_messages() {
    let mut messages = steady_run(START, Some(150));
    messages.push(boundary(MessageKind::Session, START, START + 600));

    let out = aggregate(&messages, Some(&athlete()));
    assert_eq!(out.laps.len(), 1);
    assert!(out.laps[0].implicit);
    assert_eq!(out.activities[0].lap_count, 1);
}

#[test]
fn unscored_without_athlete() {
    let mut messages = steady_run(START, Some(150));
    messages.push(boundary(MessageKind::Session, START, START + 600));

    let out = aggregate(&messages, None);
    let activity = &out.activities[0];
    assert_eq!(activity.status, ScoreStatus::Unscored);
    assert_eq!(activity.zone_minutes, None);
    assert_eq!(activity.training_load, None);
    assert_eq!(activity.avg_hr, Some(150.0));
}

#[test]
fn low_confidence_without_heart_rate() {
    let mut messages = steady_run(START, None);
    messages.push(boundary(MessageKind::Session, START, START + 600));

    let out = aggregate(&messages, Some(&athlete()));
    let activity = &out.activities[0];
    assert_eq!(activity.status, ScoreStatus::LowConfidence);
    assert_eq!(activity.avg_hr, None);
    assert_eq!(activity.hr_drift_pct, None);
    assert_eq!(activity.zone_minutes.unwrap().total(), 0.0);
    assert!(activity.training_load.unwrap() > 0.0);
}

#[test]
fn missing_session_closes_at_end() {
    let messages = steady_run(START, Some(150));
    let out = aggregate(&messages, Some(&athlete()));

    assert_eq!(out.activities.len(), 1);
    assert_eq!(out.activities[0].activity_id, START);
    assert_eq!(out.activities[0].sport, "generic");
    assert_eq!(out.warnings.len(), 1);
}

#[test]
fn pauses_are_not_moving_time() {
    let messages = [
        record(START, Some(150), 0.0),
        record(START + 10, Some(150), 30.0),
        record(START + 20, Some(150), 60.0),
        record(START + 200, Some(150), 90.0),
        record(START + 210, Some(150), 120.0),
        boundary(MessageKind::Session, START, START + 210),
    ];

    let out = aggregate(&messages, Some(&athlete()));
    let activity = &out.activities[0];
    assert!((activity.duration_min - 30.0 / 60.0).abs() < 1e-9);
    assert!((activity.zone_minutes.unwrap().total() - 30.0 / 60.0).abs() < 1e-9);
    // Under three minutes of heart-rate data.
    assert_eq!(activity.hr_drift_pct, None);

    let athlete = athlete();
    let mut aggregator = ActivityAggregator::new(Some(&athlete))
        .with_options(AggregatorOptions {
            max_sample_gap_secs: 300,
        });
    for m in &messages {
        aggregator.push(m);
    }
    let out = aggregator.finish();
    assert!((out.activities[0].duration_min - 3.5).abs() < 1e-9);
}

#[test]
fn zone_minutes_within_duration() {
    let athlete = athlete();
    let mut messages: Vec<_> = (0..=240u32)
        .map(|i| record(START + i * 5, Some(60 + (i as u64 * 7) % 140), i as f64 * 15.0))
        .collect();
    messages.push(boundary(MessageKind::Session, START, START + 1200));

    let out = aggregate(&messages, Some(&athlete));
    for activity in &out.activities {
        let zones = activity.zone_minutes.unwrap();
        assert!(zones.total() <= activity.duration_min + 0.01);
    }
    assert!(out.warnings.is_empty());
}

#[test]
fn zone_overflow_warns() {
    let mut messages = steady_run(START, Some(150));
    messages.push(
        boundary(MessageKind::Session, START, START + 600)
            .with("total_timer_time", Value::Float(60.0)),
    );

    let out = aggregate(&messages, Some(&athlete()));
    assert_eq!(out.activities.len(), 1);
    assert!(out.warnings.iter().any(|w| w.contains("exceed")));
}

#[test]
fn heart_rate_drift() {
    // 60 records ramping from 130 to 189 bpm.
    let mut messages: Vec<_> = (0..60u32)
        .map(|i| record(START + i * 10, Some(130 + i as u64), 0.0))
        .collect();
    messages.push(boundary(MessageKind::Session, START, START + 590));

    let out = aggregate(&messages, Some(&athlete()));
    let drift = out.activities[0].hr_drift_pct.unwrap();
    assert!(drift > 0.0);
}

#[test]
fn power_metrics() {
    let messages: Vec<_> = (0..60u32)
        .map(|i| {
            record(START + i, Some(150), i as f64)
                .with("power", Value::Unsigned(if i < 30 { 200 } else { 300 }))
        })
        .collect();

    let out = aggregate(&messages, Some(&athlete()));
    let activity = &out.activities[0];
    assert_eq!(activity.avg_power, Some(250.0));
    assert_eq!(activity.max_power, Some(300.0));

    let np = activity.normalized_power.unwrap();
    assert!(np > 250.0 && np < 300.0);
}

#[test]
fn decode_then_aggregate() {
    let mut data = FitWriter::new()
        .define(0, RECORD, &[(253, 4, UINT32), (3, 1, UINT8), (5, 4, UINT32)])
        .define(1, LAP, &[(253, 4, UINT32), (2, 4, UINT32)])
        .define(2, SESSION, &[(253, 4, UINT32), (2, 4, UINT32), (5, 1, ENUM)]);

    for i in 0..=60u32 {
        let mut payload = (START + i * 10).to_le_bytes().to_vec();
        payload.push(150);
        payload.extend((i * 3000).to_le_bytes());
        data = data.data(0, &payload);
    }

    let window = [(START + 600).to_le_bytes(), START.to_le_bytes()].concat();
    let mut session = window.clone();
    session.push(2);
    let data = data.data(1, &window).data(2, &session).finish_with_crc();

    let result = paceline::decode(&data).unwrap();
    assert!(result.warnings.is_empty());

    let out = aggregate(&result.messages, Some(&athlete()));
    let activity = &out.activities[0];
    assert_eq!(activity.sport, "cycling");
    assert!((activity.duration_min - 10.0).abs() < 1e-9);
    assert!((activity.distance_km - 1.8).abs() < 1e-9);
    assert_eq!(out.laps.len(), 1);
    assert!(!out.laps[0].implicit);
}

#[test]
fn metrics_serialize() {
    let mut messages = steady_run(START, Some(150));
    messages.push(boundary(MessageKind::Session, START, START + 600));

    let out = aggregate(&messages, None);
    let json = serde_json::to_value(&out.activities[0]).unwrap();
    assert_eq!(json["status"], "unscored");
    assert_eq!(json["activity_id"], START);
}

fn lap_end(end: u32) -> DecodedMessage {
    DecodedMessage::new(MessageKind::Lap).with("timestamp", Value::Unsigned(end as u64))
}

fn assert_laps_within_activity(out: &paceline::metrics::Aggregate) {
    for activity in &out.activities {
        let laps: Vec<_> = out
            .laps
            .iter()
            .filter(|l| l.activity_id == activity.activity_id)
            .collect();
        assert_eq!(laps.len(), activity.lap_count);

        let total: f64 = laps.iter().map(|l| l.duration_min).sum();
        assert!(total <= activity.duration_min + 1e-9);
    }
}

#[test]
fn trailing_records_close_implicit_lap() {
    let run = steady_run(START, Some(150));
    let mut messages = run[..31].to_vec();
    messages.push(boundary(MessageKind::Lap, START, START + 300));
    messages.extend_from_slice(&run[31..]);
    messages.push(boundary(MessageKind::Session, START, START + 600));

    let out = aggregate(&messages, Some(&athlete()));
    assert_eq!(out.activities[0].lap_count, 2);
    assert_eq!(out.laps.len(), 2);

    assert!(!out.laps[0].implicit);
    assert!((out.laps[0].duration_min - 5.0).abs() < 1e-9);

    assert!(out.laps[1].implicit);
    assert_eq!(out.laps[1].lap_index, 1);
    assert_eq!(out.laps[1].activity_id, START);
    assert_eq!(out.laps[1].start, profile::to_utc(START + 310));
    assert!((out.laps[1].duration_min - 290.0 / 60.0).abs() < 1e-9);

    assert_laps_within_activity(&out);
}

#[test]
fn laps_without_start_time_do_not_overlap() {
    let run = steady_run(START, Some(150));
    let mut messages = run[..31].to_vec();
    messages.push(lap_end(START + 300));
    messages.extend_from_slice(&run[31..]);
    messages.push(lap_end(START + 600));
    messages.push(boundary(MessageKind::Session, START, START + 600));

    let out = aggregate(&messages, Some(&athlete()));
    assert_eq!(out.laps.len(), 2);
    assert!(out.laps.iter().all(|l| !l.implicit));

    let durations: Vec<_> = out.laps.iter().map(|l| l.duration_min).collect();
    assert!((durations[0] - 5.0).abs() < 1e-9);
    assert!((durations[1] - 290.0 / 60.0).abs() < 1e-9);
    assert_eq!(out.laps[0].start, profile::to_utc(START));
    assert_eq!(out.laps[1].start, profile::to_utc(START + 310));

    let lap_zones: f64 = out.laps.iter().map(|l| l.zone_minutes.unwrap().total()).sum();
    assert!(lap_zones <= out.activities[0].zone_minutes.unwrap().total() + 1e-9);

    assert_laps_within_activity(&out);
}

#[test]
fn laps_partition_activity() {
    let run = steady_run(START, Some(140));
    let mut messages = run[..21].to_vec();
    messages.push(boundary(MessageKind::Lap, START, START + 200));
    messages.extend_from_slice(&run[21..41]);
    messages.push(lap_end(START + 400));
    messages.extend_from_slice(&run[41..]);
    messages.push(boundary(MessageKind::Session, START, START + 600));

    let out = aggregate(&messages, Some(&athlete()));
    let implicit: Vec<_> = out.laps.iter().map(|l| l.implicit).collect();
    assert_eq!(implicit, [false, false, true]);

    let durations: Vec<_> = out.laps.iter().map(|l| l.duration_min * 60.0).collect();
    assert!((durations[0] - 200.0).abs() < 1e-9);
    assert!((durations[1] - 190.0).abs() < 1e-9);
    assert!((durations[2] - 190.0).abs() < 1e-9);

    assert_laps_within_activity(&out);
}
