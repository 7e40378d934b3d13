#![allow(dead_code)]

//! A small encoder for synthetic FIT documents.

use paceline::sans::check::compute_crc;

pub const RECORD: u16 = 20;
pub const LAP: u16 = 19;
pub const SESSION: u16 = 18;

pub const ENUM: u8 = 0x00;
pub const UINT8: u8 = 0x02;
pub const SINT16: u8 = 0x83;
pub const UINT16: u8 = 0x84;
pub const UINT32: u8 = 0x86;
pub const STRING: u8 = 0x07;

/// Accumulates records, then frames them with a document header.
#[derive(Debug, Default)]
pub struct FitWriter {
    records: Vec<u8>,
}

impl FitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A little-endian definition message. Fields are `(number, size, base_type)`.
    pub fn define(self, local: u8, global: u16, fields: &[(u8, u8, u8)]) -> Self {
        self.definition(0x40 | local, 0, global.to_le_bytes(), fields, None)
    }

    pub fn define_big_endian(self, local: u8, global: u16, fields: &[(u8, u8, u8)]) -> Self {
        self.definition(0x40 | local, 1, global.to_be_bytes(), fields, None)
    }

    pub fn define_with_developer(
        self,
        local: u8,
        global: u16,
        fields: &[(u8, u8, u8)],
        developer: &[(u8, u8, u8)],
    ) -> Self {
        self.definition(0x60 | local, 0, global.to_le_bytes(), fields, Some(developer))
    }

    fn definition(
        mut self,
        header: u8,
        architecture: u8,
        global: [u8; 2],
        fields: &[(u8, u8, u8)],
        developer: Option<&[(u8, u8, u8)]>,
    ) -> Self {
        self.records.extend([header, 0, architecture, global[0], global[1]]);
        self.records.push(fields.len() as u8);
        for &(number, size, base_type) in fields {
            self.records.extend([number, size, base_type]);
        }
        if let Some(developer) = developer {
            self.records.push(developer.len() as u8);
            for &(number, size, index) in developer {
                self.records.extend([number, size, index]);
            }
        }
        self
    }

    /// A data message with a normal header.
    pub fn data(mut self, local: u8, payload: &[u8]) -> Self {
        self.records.push(local & 0x0F);
        self.records.extend_from_slice(payload);
        self
    }

    /// A data message with a compressed timestamp header.
    pub fn compressed(mut self, local: u8, time_offset: u8, payload: &[u8]) -> Self {
        self.records.push(0x80 | ((local & 0x03) << 5) | (time_offset & 0x1F));
        self.records.extend_from_slice(payload);
        self
    }

    /// Arbitrary bytes in the record stream.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.records.extend_from_slice(bytes);
        self
    }

    pub fn data_size(&self) -> usize {
        self.records.len()
    }

    /// A 12-byte header and no trailing check value.
    pub fn finish(self) -> Vec<u8> {
        let mut out = header(12, self.records.len() as u32);
        out.extend(self.records);
        out
    }

    /// A 14-byte header with its check value, and a trailing file check value.
    pub fn finish_with_crc(self) -> Vec<u8> {
        let mut out = header(14, self.records.len() as u32);
        let header_crc = compute_crc(0, &out[..12]);
        out.extend(header_crc.to_le_bytes());
        out.extend(self.records);
        let crc = compute_crc(0, &out);
        out.extend(crc.to_le_bytes());
        out
    }
}

fn header(size: u8, data_size: u32) -> Vec<u8> {
    let mut out = vec![size, 16];
    out.extend(100u16.to_le_bytes());
    out.extend(data_size.to_le_bytes());
    out.extend(b".FIT");
    out
}
