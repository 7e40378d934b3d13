//! The subset of the FIT global profile needed for activity metrics.
//!
//! Each known message maps field numbers to a name, scale, offset and unit.
//! A raw value `x` becomes `x / scale - offset`. Fields and messages outside
//! this table are still decoded, but keep their raw values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Semantic category of a data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    FileId,
    Session,
    Lap,
    Record,
    Event,
    DeviceInfo,
    Activity,
    Unknown(u16),
}

/// Profile entry for a single field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldProfile {
    pub number: u8,
    pub name: &'static str,
    pub scale: f64,
    pub offset: f64,
    pub units: &'static str,
}

impl FieldProfile {
    /// Whether raw values pass through unchanged.
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.offset == 0.0
    }

    pub fn apply(&self, raw: f64) -> f64 {
        raw / self.scale - self.offset
    }
}

/// Profile entry for a global message.
#[derive(Debug)]
pub struct MessageProfile {
    pub global_message: u16,
    pub name: &'static str,
    pub kind: MessageKind,
    pub fields: &'static [FieldProfile],
}

impl MessageProfile {
    pub fn field(&self, number: u8) -> Option<&'static FieldProfile> {
        self.fields.iter().find(|f| f.number == number)
    }
}

/// Field number of the absolute timestamp, common to all messages.
pub const TIMESTAMP_FIELD: u8 = 253;

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;

/// Semicircles per degree (2^31 / 180).
const SEMICIRCLES: f64 = 11_930_464.711_111_111;

const fn field(number: u8, name: &'static str, units: &'static str) -> FieldProfile {
    scaled(number, name, 1.0, 0.0, units)
}

const fn scaled(
    number: u8,
    name: &'static str,
    scale: f64,
    offset: f64,
    units: &'static str,
) -> FieldProfile {
    FieldProfile {
        number,
        name,
        scale,
        offset,
        units,
    }
}

const TIMESTAMP: FieldProfile = field(TIMESTAMP_FIELD, "timestamp", "s");
const MESSAGE_INDEX: FieldProfile = field(254, "message_index", "");

const FILE_ID: &[FieldProfile] = &[
    field(0, "type", ""),
    field(1, "manufacturer", ""),
    field(2, "product", ""),
    field(3, "serial_number", ""),
    field(4, "time_created", "s"),
    field(5, "number", ""),
    field(8, "product_name", ""),
];

const SESSION: &[FieldProfile] = &[
    TIMESTAMP,
    MESSAGE_INDEX,
    field(0, "event", ""),
    field(1, "event_type", ""),
    field(2, "start_time", "s"),
    scaled(3, "start_position_lat", SEMICIRCLES, 0.0, "deg"),
    scaled(4, "start_position_long", SEMICIRCLES, 0.0, "deg"),
    field(5, "sport", ""),
    field(6, "sub_sport", ""),
    scaled(7, "total_elapsed_time", 1000.0, 0.0, "s"),
    scaled(8, "total_timer_time", 1000.0, 0.0, "s"),
    scaled(9, "total_distance", 100.0, 0.0, "m"),
    field(11, "total_calories", "kcal"),
    scaled(14, "avg_speed", 1000.0, 0.0, "m/s"),
    scaled(15, "max_speed", 1000.0, 0.0, "m/s"),
    field(16, "avg_heart_rate", "bpm"),
    field(17, "max_heart_rate", "bpm"),
    field(18, "avg_cadence", "rpm"),
    field(19, "max_cadence", "rpm"),
    field(20, "avg_power", "W"),
    field(21, "max_power", "W"),
    field(22, "total_ascent", "m"),
    field(23, "total_descent", "m"),
    field(25, "first_lap_index", ""),
    field(26, "num_laps", ""),
    scaled(124, "enhanced_avg_speed", 1000.0, 0.0, "m/s"),
    scaled(125, "enhanced_max_speed", 1000.0, 0.0, "m/s"),
];

const LAP: &[FieldProfile] = &[
    TIMESTAMP,
    MESSAGE_INDEX,
    field(0, "event", ""),
    field(1, "event_type", ""),
    field(2, "start_time", "s"),
    scaled(3, "start_position_lat", SEMICIRCLES, 0.0, "deg"),
    scaled(4, "start_position_long", SEMICIRCLES, 0.0, "deg"),
    scaled(5, "end_position_lat", SEMICIRCLES, 0.0, "deg"),
    scaled(6, "end_position_long", SEMICIRCLES, 0.0, "deg"),
    scaled(7, "total_elapsed_time", 1000.0, 0.0, "s"),
    scaled(8, "total_timer_time", 1000.0, 0.0, "s"),
    scaled(9, "total_distance", 100.0, 0.0, "m"),
    field(11, "total_calories", "kcal"),
    scaled(13, "avg_speed", 1000.0, 0.0, "m/s"),
    scaled(14, "max_speed", 1000.0, 0.0, "m/s"),
    field(15, "avg_heart_rate", "bpm"),
    field(16, "max_heart_rate", "bpm"),
    field(17, "avg_cadence", "rpm"),
    field(18, "max_cadence", "rpm"),
    field(19, "avg_power", "W"),
    field(20, "max_power", "W"),
    field(21, "total_ascent", "m"),
    field(22, "total_descent", "m"),
    field(25, "sport", ""),
    scaled(110, "enhanced_avg_speed", 1000.0, 0.0, "m/s"),
    scaled(111, "enhanced_max_speed", 1000.0, 0.0, "m/s"),
];

const RECORD: &[FieldProfile] = &[
    TIMESTAMP,
    scaled(0, "position_lat", SEMICIRCLES, 0.0, "deg"),
    scaled(1, "position_long", SEMICIRCLES, 0.0, "deg"),
    scaled(2, "altitude", 5.0, 500.0, "m"),
    field(3, "heart_rate", "bpm"),
    field(4, "cadence", "rpm"),
    scaled(5, "distance", 100.0, 0.0, "m"),
    scaled(6, "speed", 1000.0, 0.0, "m/s"),
    field(7, "power", "W"),
    field(13, "temperature", "C"),
    scaled(73, "enhanced_speed", 1000.0, 0.0, "m/s"),
    scaled(78, "enhanced_altitude", 5.0, 500.0, "m"),
];

const EVENT: &[FieldProfile] = &[
    TIMESTAMP,
    field(0, "event", ""),
    field(1, "event_type", ""),
    field(3, "data", ""),
    field(4, "event_group", ""),
];

const DEVICE_INFO: &[FieldProfile] = &[
    TIMESTAMP,
    field(0, "device_index", ""),
    field(1, "device_type", ""),
    field(2, "manufacturer", ""),
    field(3, "serial_number", ""),
    field(4, "product", ""),
    scaled(5, "software_version", 100.0, 0.0, ""),
    field(6, "hardware_version", ""),
    scaled(10, "battery_voltage", 256.0, 0.0, "V"),
    field(27, "product_name", ""),
];

const ACTIVITY: &[FieldProfile] = &[
    TIMESTAMP,
    scaled(0, "total_timer_time", 1000.0, 0.0, "s"),
    field(1, "num_sessions", ""),
    field(2, "type", ""),
    field(3, "event", ""),
    field(4, "event_type", ""),
    field(5, "local_timestamp", "s"),
];

static MESSAGES: &[MessageProfile] = &[
    MessageProfile {
        global_message: 0,
        name: "file_id",
        kind: MessageKind::FileId,
        fields: FILE_ID,
    },
    MessageProfile {
        global_message: 18,
        name: "session",
        kind: MessageKind::Session,
        fields: SESSION,
    },
    MessageProfile {
        global_message: 19,
        name: "lap",
        kind: MessageKind::Lap,
        fields: LAP,
    },
    MessageProfile {
        global_message: 20,
        name: "record",
        kind: MessageKind::Record,
        fields: RECORD,
    },
    MessageProfile {
        global_message: 21,
        name: "event",
        kind: MessageKind::Event,
        fields: EVENT,
    },
    MessageProfile {
        global_message: 23,
        name: "device_info",
        kind: MessageKind::DeviceInfo,
        fields: DEVICE_INFO,
    },
    MessageProfile {
        global_message: 34,
        name: "activity",
        kind: MessageKind::Activity,
        fields: ACTIVITY,
    },
];

/// Look up a global message in the profile.
pub fn message(global_message: u16) -> Option<&'static MessageProfile> {
    MESSAGES.iter().find(|m| m.global_message == global_message)
}

/// Categorise a global message number.
pub fn kind(global_message: u16) -> MessageKind {
    message(global_message).map_or(MessageKind::Unknown(global_message), |m| m.kind)
}

/// Global message number for a known category.
pub fn global_message(kind: MessageKind) -> u16 {
    match kind {
        MessageKind::Unknown(n) => n,
        kind => MESSAGES
            .iter()
            .find(|m| m.kind == kind)
            .map_or(u16::MAX, |m| m.global_message),
    }
}

/// Name of a value of the `sport` enumeration.
pub fn sport_name(sport: u64) -> &'static str {
    match sport {
        0 => "generic",
        1 => "running",
        2 => "cycling",
        3 => "transition",
        4 => "fitness_equipment",
        5 => "swimming",
        6 => "basketball",
        7 => "soccer",
        8 => "tennis",
        10 => "training",
        11 => "walking",
        12 => "cross_country_skiing",
        13 => "alpine_skiing",
        14 => "snowboarding",
        15 => "rowing",
        16 => "mountaineering",
        17 => "hiking",
        18 => "multisport",
        19 => "paddling",
        _ => "other",
    }
}

/// Convert a FIT timestamp to a UTC date-time.
pub fn to_utc(timestamp: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp as i64 + FIT_EPOCH_OFFSET, 0)
}
