//! Cursor over a resident byte buffer.

use thiserror::Error;

/// An error reading from a [`BinaryReader`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// A read or seek would pass the end of the buffer.
    #[error("Read of {len} bytes at offset {offset} exceeds buffer length {size}.")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
}

/// Byte order of multi-byte values.
///
/// FIT declares this per definition message through its architecture byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Interpret a definition message architecture byte.
    pub fn from_architecture(architecture: u8) -> Self {
        if architecture == 0 {
            Self::Little
        } else {
            Self::Big
        }
    }
}

/// A little- or big-endian cursor over a fixed-length byte buffer.
///
/// Reads never truncate: a read that would pass the end of the buffer fails
/// with [`ReadError::OutOfBounds`] and leaves the cursor where it was.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

macro_rules! read_number {
    ($name:ident, $t:ty) => {
        #[doc = concat!("Read a `", stringify!($t), "`, advancing the cursor by its width.")]
        pub fn $name(&mut self, endian: Endian) -> Result<$t, ReadError> {
            let bytes = self.read_array::<{ size_of::<$t>() }>()?;
            Ok(match endian {
                Endian::Little => <$t>::from_le_bytes(bytes),
                Endian::Big => <$t>::from_be_bytes(bytes),
            })
        }
    };
}

impl<'a> BinaryReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Absolute offset of the cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Move the cursor to an absolute offset. Seeking to the very end is
    /// allowed; seeking past it is not.
    pub fn seek(&mut self, offset: usize) -> Result<(), ReadError> {
        if offset > self.buf.len() {
            return Err(ReadError::OutOfBounds {
                offset,
                len: 0,
                size: self.buf.len(),
            });
        }

        self.pos = offset;
        Ok(())
    }

    /// Take a slice of `len` bytes, advancing the cursor.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(ReadError::OutOfBounds {
                offset: self.pos,
                len,
                size: self.buf.len(),
            })?;

        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Take an exact number of bytes, advancing the cursor.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let mut out = [0; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Skip `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), ReadError> {
        self.read_bytes(len).map(|_| ())
    }

    read_number!(read_u8, u8);
    read_number!(read_u16, u16);
    read_number!(read_u32, u32);
    read_number!(read_i8, i8);
    read_number!(read_i16, i16);
    read_number!(read_i32, i32);
    read_number!(read_u64, u64);
    read_number!(read_i64, i64);
    read_number!(read_f32, f32);
    read_number!(read_f64, f64);

    /// Read a fixed-width, NUL-padded string field.
    ///
    /// Bytes after the first NUL are ignored, and invalid UTF-8 sequences are
    /// replaced rather than rejected.
    pub fn read_string(&mut self, len: usize) -> Result<String, ReadError> {
        let bytes = self.read_bytes(len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}
