//! The decoding state machine.
//!
//! A [`FitDecoder`] moves through `ReadingHeader`, `ReadingRecords` and then
//! `Done`, or `Failed` if the document header is unusable. Each call to
//! [`FitDecoder::step`] consumes one header or one record.
//!
//! # Recovery
//!
//! Real device output is routinely slightly malformed. When a record cannot be
//! decoded (its header points past the end of the data section, references a
//! local message type with no definition, or declares an unknown base type) the
//! decoder records a warning, moves the cursor one byte past where the record
//! began, and carries on. Nothing decoded before the fault is lost.
//!
//! Check values are verified when present, but a mismatch is only a warning.
//! Documents chained one after another in the same buffer are decoded in turn,
//! each with a fresh definition table.

use std::{borrow::Cow, collections::BTreeMap};

use either::Either::{Left, Right};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::{
    DecodeResult, DecodedMessage, Value,
    reader::{BinaryReader, Endian, ReadError},
    table::{DefinitionTable, TableError},
};
use crate::{
    profile::{self, FieldProfile, TIMESTAMP_FIELD},
    sans::{
        check::verify_crc,
        data::BaseType,
        definition::{DefinitionError, MessageDefinition},
        header::{DataHeader, FitHeader, HeaderError, MIN_HEADER_SIZE, classify_record_header},
    },
};

/// A fatal error decoding a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Incorrect or truncated document header.
    #[error("Incorrect file header: {0}")]
    Header(#[from] HeaderError),
    /// The decoder already failed.
    #[error("Decoder already failed.")]
    Failed,
}

/// An error decoding a single record. These never escape the decoder; they
/// become warnings.
#[derive(Debug, Error)]
enum RecordError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

/// Progress of a [`FitDecoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    ReadingHeader,
    /// Decoding records until the cursor reaches `end`.
    ReadingRecords {
        end: usize,
    },
    Done,
    Failed,
}

/// Single-pass decoder over a resident buffer.
///
/// Holds all mutable decoding state, including the definition table, so
/// independent decoders never interfere.
#[derive(Debug)]
pub struct FitDecoder<'a> {
    buf: &'a [u8],
    state: DecoderState,
    cursor: usize,
    document_start: usize,
    table: DefinitionTable,
    header: Option<FitHeader>,
    last_timestamp: Option<u32>,
    messages: Vec<DecodedMessage>,
    warnings: Vec<String>,
    skipped_bytes: usize,
    documents: usize,
}

impl<'a> FitDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            state: DecoderState::ReadingHeader,
            cursor: 0,
            document_start: 0,
            table: DefinitionTable::new(),
            header: None,
            last_timestamp: None,
            messages: Vec::new(),
            warnings: Vec::new(),
            skipped_bytes: 0,
            documents: 0,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Absolute offset of the next byte to decode.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Messages decoded so far.
    pub fn messages(&self) -> &[DecodedMessage] {
        &self.messages
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Advance by one header or record.
    ///
    /// Returns the state after the transition. Stepping a finished decoder is
    /// a no-op, and stepping a failed one returns [`DecodeError::Failed`].
    pub fn step(&mut self) -> Result<DecoderState, DecodeError> {
        match self.state {
            DecoderState::ReadingHeader => self.read_header()?,
            DecoderState::ReadingRecords { end } if self.cursor < end => self.read_record(end),
            DecoderState::ReadingRecords { end } => self.finish_document(end),
            DecoderState::Done => {}
            DecoderState::Failed => Err(DecodeError::Failed)?,
        }

        Ok(self.state)
    }

    /// Step until done, yielding everything decoded.
    pub fn run(mut self) -> Result<DecodeResult, DecodeError> {
        while self.step()? != DecoderState::Done {}
        self.into_result()
    }

    fn into_result(self) -> Result<DecodeResult, DecodeError> {
        let header = self.header.ok_or(DecodeError::Failed)?;

        Ok(DecodeResult {
            header,
            messages: self.messages,
            warnings: self.warnings,
            skipped_bytes: self.skipped_bytes,
            documents: self.documents,
        })
    }

    fn warn(&mut self, message: String) {
        warn!(offset = self.cursor, "{message}");
        self.warnings.push(message);
    }

    fn read_header(&mut self) -> Result<(), DecodeError> {
        let buf = self.buf;
        let mut r = BinaryReader::new(&buf[self.document_start..]);

        match FitHeader::read(&mut r) {
            Ok((header, crc_ok)) => {
                if !crc_ok {
                    self.warn(format!(
                        "Header check value mismatch in document at offset {}.",
                        self.document_start
                    ));
                }

                let end = self.document_start
                    + header.header_size as usize
                    + header.data_size as usize;
                debug!(
                    offset = self.document_start,
                    protocol_version = header.protocol_version,
                    profile_version = header.profile_version,
                    data_size = header.data_size,
                    "document header"
                );

                self.cursor = self.document_start + r.position();
                self.table.reset();
                self.header.get_or_insert(header);
                self.documents += 1;
                self.state = DecoderState::ReadingRecords { end };
                Ok(())
            }
            Err(err) if self.header.is_some() => {
                self.warn(format!(
                    "Stopped at chained document at offset {}: {err}",
                    self.document_start
                ));
                self.state = DecoderState::Done;
                Ok(())
            }
            Err(err) => {
                self.state = DecoderState::Failed;
                Err(err.into())
            }
        }
    }

    fn read_record(&mut self, end: usize) {
        let start = self.cursor;
        let buf = self.buf;
        let mut r = BinaryReader::new(&buf[..end]);

        match self.read_message(&mut r, start) {
            Ok(()) => self.cursor = r.position(),
            Err(err) => {
                self.warn(format!("Skipped malformed record at offset {start}: {err}"));
                self.cursor = start + 1;
                self.skipped_bytes += 1;
            }
        }
    }

    fn read_message(&mut self, r: &mut BinaryReader, start: usize) -> Result<(), RecordError> {
        r.seek(start)?;
        let (local, kind) = classify_record_header(r.read_u8(Endian::Little)?);

        match kind {
            Left(header) => {
                let definition = MessageDefinition::read(r, local, header)?;
                let global_message = definition.global_message;
                let fields = definition.fields.len();
                self.table.define(local, definition);
                debug!(
                    local,
                    global_message,
                    fields,
                    active = self.table.active(),
                    "definition"
                );
            }
            Right(header) => {
                let definition = self.table.lookup(local)?;

                let len = definition.data_size();
                if len > r.remaining() {
                    Err(ReadError::OutOfBounds {
                        offset: r.position(),
                        len,
                        size: r.len(),
                    })?;
                }

                let message = read_data(r, definition)?;
                self.accept(message, header);
            }
        }

        Ok(())
    }

    fn accept(&mut self, mut message: DecodedMessage, header: DataHeader) {
        if let Some(offset) = header.time_offset {
            match self.last_timestamp {
                Some(last) => {
                    let timestamp = resolve_time_offset(last, offset);
                    message.timestamp = Some(timestamp);
                    message
                        .fields
                        .insert(Cow::Borrowed("timestamp"), Value::Unsigned(timestamp as u64));
                }
                None => self.warn(format!(
                    "Compressed timestamp at offset {} has no reference time.",
                    self.cursor
                )),
            }
        }

        if let Some(timestamp) = message.timestamp {
            self.last_timestamp = Some(timestamp);
        }

        trace!(kind = ?message.kind, fields = message.fields.len(), "message");
        self.messages.push(message);
    }

    fn finish_document(&mut self, end: usize) {
        let buf = self.buf;
        let mut next = end;

        if let Some(&[lo, hi]) = buf.get(end..end + 2) {
            let found = u16::from_le_bytes([lo, hi]);
            if let Err(calculated) = verify_crc(found, &buf[self.document_start..end]) {
                self.warn(format!(
                    "Calculated ({calculated:#06x}) and found ({found:#06x}) check values do not match."
                ));
            }
            next += 2;
        }

        self.cursor = next;
        let trailing = &buf[next..];

        if trailing.is_empty() {
            self.state = DecoderState::Done;
        } else if trailing.len() >= MIN_HEADER_SIZE as usize && &trailing[8..12] == b".FIT" {
            self.document_start = next;
            self.state = DecoderState::ReadingHeader;
        } else {
            self.warn(format!("Ignored {} trailing bytes.", trailing.len()));
            self.state = DecoderState::Done;
        }
    }
}

/// Decode every message in a buffer.
pub fn decode(buf: &[u8]) -> Result<DecodeResult, DecodeError> {
    FitDecoder::new(buf).run()
}

/// Resolve a five-bit compressed time offset against the last absolute
/// timestamp. Offsets only roll forward.
fn resolve_time_offset(last: u32, offset: u8) -> u32 {
    let offset = (offset & 0x1F) as u32;
    let resolved = (last & !0x1F) | offset;

    if offset < last & 0x1F {
        resolved.wrapping_add(0x20)
    } else {
        resolved
    }
}

fn read_data(
    r: &mut BinaryReader,
    definition: &MessageDefinition,
) -> Result<DecodedMessage, ReadError> {
    let message_profile = profile::message(definition.global_message);

    let mut fields = BTreeMap::new();
    let mut timestamp = None;

    for field in &definition.fields {
        let bytes = r.read_bytes(field.size as usize)?;
        let field_profile = message_profile.and_then(|p| p.field(field.number));

        let Some(value) = field_value(bytes, field.base_type, definition.endian, field_profile)
        else {
            continue;
        };

        let name = match field_profile {
            Some(p) => Cow::Borrowed(p.name),
            None if field.number == TIMESTAMP_FIELD => Cow::Borrowed("timestamp"),
            None => Cow::Owned(format!("field_{}", field.number)),
        };

        if field.number == TIMESTAMP_FIELD {
            timestamp = value.as_u64().and_then(|t| u32::try_from(t).ok());
        }

        fields.insert(name, value);
    }

    // Developer payloads are consumed but not interpreted.
    for field in &definition.developer_fields {
        r.skip(field.size as usize)?;
    }

    Ok(DecodedMessage {
        kind: profile::kind(definition.global_message),
        global_message: definition.global_message,
        timestamp,
        fields,
    })
}

fn field_value(
    bytes: &[u8],
    base_type: BaseType,
    endian: Endian,
    profile: Option<&FieldProfile>,
) -> Option<Value> {
    match base_type {
        BaseType::String => {
            let s = BinaryReader::new(bytes).read_string(bytes.len()).ok()?;
            (!s.is_empty()).then_some(Value::Text(s))
        }
        BaseType::Byte => {
            let valid = bytes.iter().any(|&b| b != 0xFF);
            valid.then(|| Value::Bytes(bytes.to_vec()))
        }
        _ if bytes.is_empty() => None,
        _ if bytes.len() % base_type.width() != 0 => Some(Value::Bytes(bytes.to_vec())),
        _ => {
            let mut values: Vec<Value> = bytes
                .chunks_exact(base_type.width())
                .filter_map(|element| base_type.decode(element, endian))
                .map(|raw| Value::scaled(raw, profile))
                .collect();

            if bytes.len() == base_type.width() {
                values.pop()
            } else if values.is_empty() {
                None
            } else {
                Some(Value::Array(values))
            }
        }
    }
}
