//! Document and record headers.

use either::Either::{self, Left, Right};
use serde::Serialize;
use tartan_bitfield::bitfield;
use thiserror::Error;
use zerocopy::{FromBytes, little_endian};

use super::check::verify_crc;
use crate::decode::reader::{BinaryReader, Endian};

/// Size of the smallest document header.
pub const MIN_HEADER_SIZE: u8 = 12;

/// An error decoding a document header. All of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// Incorrect filetype marker.
    #[error("Incorrect file type marker.")]
    InvalidSignature,
    /// Declared header or data size exceeds the buffer.
    #[error("Buffer of {actual} bytes is shorter than the declared {declared}.")]
    BufferTooShort { declared: usize, actual: usize },
    /// Header length below the protocol minimum.
    #[error("Unknown header length ({0}).")]
    UnknownHeaderLength(u8),
}

/// A decoded document header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FitHeader {
    pub header_size: u8,
    pub protocol_version: u8,
    pub profile_version: u16,
    pub data_size: u32,
    /// Header check value, present for 14-byte headers. Zero means unset.
    pub crc: Option<u16>,
}

#[repr(C)]
#[derive(FromBytes)]
struct RawFileHeader {
    header_size: u8,
    protocol_version: u8,
    profile_version: little_endian::U16,
    data_size: little_endian::U32,
    data_type: [u8; 4],
}

impl FitHeader {
    /// Decode a document header at the cursor, leaving the cursor at the first
    /// record header.
    ///
    /// Returns the header and whether its check value, if set, matched.
    pub fn read(r: &mut BinaryReader) -> Result<(Self, bool), HeaderError> {
        let start = r.position();
        let actual = r.remaining();
        let too_short = |declared: usize| HeaderError::BufferTooShort { declared, actual };

        let bytes: [u8; 12] = r
            .read_array()
            .map_err(|_| too_short(MIN_HEADER_SIZE as usize))?;

        let RawFileHeader {
            header_size,
            protocol_version,
            profile_version,
            data_size,
            data_type,
        } = zerocopy::transmute!(bytes);

        if &data_type != b".FIT" {
            Err(HeaderError::InvalidSignature)?;
        }

        if header_size < MIN_HEADER_SIZE {
            Err(HeaderError::UnknownHeaderLength(header_size))?;
        }

        let data_size = data_size.get();
        let declared = header_size as usize + data_size as usize;
        if declared > actual {
            Err(too_short(declared))?;
        }

        let mut crc = None;
        let mut crc_ok = true;

        if header_size >= 14 {
            let found = r
                .read_u16(Endian::Little)
                .map_err(|_| too_short(header_size as usize))?;
            crc = Some(found);
            crc_ok = found == 0 || verify_crc(found, &bytes).is_ok();
        }

        r.seek(start + header_size as usize)
            .map_err(|_| too_short(header_size as usize))?;

        let header = Self {
            header_size,
            protocol_version,
            profile_version: profile_version.get(),
            data_size,
            crc,
        };

        Ok((header, crc_ok))
    }
}

/// Kind of message following a definition record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefinitionHeader {
    /// Whether developer field descriptors follow the regular ones.
    pub has_developer_fields: bool,
}

/// Kind of message following a data record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    /// The five-bit time offset of a compressed timestamp header.
    pub time_offset: Option<u8>,
}

/// Classify a one-byte record header.
///
/// Returns the local message number, and either a definition or data header.
pub fn classify_record_header(r: u8) -> (u8, Either<DefinitionHeader, DataHeader>) {
    bitfield! {
        struct RecordHeader(u8) {
            [7] is_compressed,
        }
    }

    if RecordHeader(r).is_compressed() {
        bitfield! {
            struct CompressedHeader(u8) {
                [0..5] time_offset: u8,
                [5..7] local_message: u8,
            }
        }

        let header = CompressedHeader(r);
        let data = DataHeader {
            time_offset: Some(header.time_offset()),
        };

        (header.local_message(), Right(data))
    } else {
        bitfield! {
            struct NormalHeader(u8) {
                [0..4] local_message: u8,
                [5] is_developer,
                [6] is_definition,
            }
        }

        let header = NormalHeader(r);
        let kind = if header.is_definition() {
            Left(DefinitionHeader {
                has_developer_fields: header.is_developer(),
            })
        } else {
            Right(DataHeader { time_offset: None })
        };

        (header.local_message(), kind)
    }
}
