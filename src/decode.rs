//! Decoding of documents held in memory.
//!
//! Most users should call [`decode`] with the bytes of a whole file. It returns
//! every data message it could recover, each tagged with its semantic
//! [`MessageKind`] and holding profile-scaled [`Value`]s, along with a list of
//! warnings describing anything that was skipped.
//!
//! ```
//! let bytes = std::fs::read("afternoon-ride.fit")?;
//! let result = paceline::decode::decode(&bytes)?;
//!
//! for message in result.records() {
//!     println!("{:?}", message.f64("heart_rate"));
//! }
//! ```
//!
//! Decoding is forgiving. Only a broken document header fails outright; a
//! malformed record is skipped one byte at a time until the decoder finds its
//! footing again. See [`machine`] for the state machine driving this.

use std::{borrow::Cow, collections::BTreeMap};

use serde::Serialize;

use crate::{
    profile::{self, FieldProfile, MessageKind},
    sans::{data::RawValue, header::FitHeader},
};

pub mod machine;
pub mod reader;
pub mod table;

pub use machine::{DecodeError, DecoderState, FitDecoder, decode};

/// A field value after profile scaling.
///
/// Integers whose field has no scale or offset stay integers, so they compare
/// exactly with what was encoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
}

impl Value {
    /// Numeric value, if this is a scalar number.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Unsigned(v) => Some(v as f64),
            Self::Signed(v) => Some(v as f64),
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::Unsigned(v) => Some(v),
            Self::Signed(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn scaled(raw: RawValue, profile: Option<&FieldProfile>) -> Self {
        match profile {
            Some(p) if !p.is_identity() => Self::Float(p.apply(raw.as_f64())),
            _ => match raw {
                RawValue::Unsigned(v) => Self::Unsigned(v),
                RawValue::Signed(v) => Self::Signed(v),
                RawValue::Float(v) => Self::Float(v),
            },
        }
    }
}

/// A decoded data message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMessage {
    pub kind: MessageKind,
    pub global_message: u16,
    /// Absolute FIT timestamp, from the `timestamp` field or resolved from a
    /// compressed timestamp header.
    pub timestamp: Option<u32>,
    /// Values keyed by profile field name, or `field_<n>` for fields outside
    /// the profile. Fields holding their 'invalid' marker are absent.
    pub fields: BTreeMap<Cow<'static, str>, Value>,
}

impl DecodedMessage {
    /// An empty message of a known kind.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            global_message: profile::global_message(kind),
            timestamp: None,
            fields: BTreeMap::new(),
        }
    }

    /// Add a field, keeping `timestamp` in sync with the field of that name.
    pub fn with(mut self, name: &'static str, value: Value) -> Self {
        if name == "timestamp" {
            self.timestamp = value.as_u64().and_then(|t| u32::try_from(t).ok());
        }
        self.fields.insert(Cow::Borrowed(name), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Numeric value of a field.
    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Non-negative integer value of a field.
    pub fn u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    /// Timestamp-like field (such as `start_time`) as FIT seconds.
    pub fn time(&self, name: &str) -> Option<u32> {
        self.u64(name).and_then(|t| u32::try_from(t).ok())
    }
}

/// Output of decoding a whole buffer.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeResult {
    /// Header of the first document in the buffer.
    pub header: FitHeader,
    /// Every recovered data message, in document order.
    pub messages: Vec<DecodedMessage>,
    /// Soft problems encountered, in document order.
    pub warnings: Vec<String>,
    /// Bytes stepped over while resynchronising after malformed records.
    pub skipped_bytes: usize,
    /// Number of chained documents decoded.
    pub documents: usize,
}

impl DecodeResult {
    /// Messages of a single kind.
    pub fn of_kind(&self, kind: MessageKind) -> impl Iterator<Item = &DecodedMessage> {
        self.messages.iter().filter(move |m| m.kind == kind)
    }

    pub fn records(&self) -> impl Iterator<Item = &DecodedMessage> {
        self.of_kind(MessageKind::Record)
    }
}
