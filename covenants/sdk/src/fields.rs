//! Canonical field serialization for covenant state blobs.
//!
//! Every contract field is written with a fixed-width or length-prefixed encoding so that
//! two independently computed states with the same logical content always produce the same
//! bytes:
//!
//! - `u64`: 8 bytes, little-endian
//! - `bool`: a single `0x00` / `0x01` byte
//! - fixed arrays (keys): raw bytes
//! - byte strings: 4-byte little-endian length followed by the bytes

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("field `{field}` needs {needed} bytes but only {available} remain")]
    Truncated { field: &'static str, needed: usize, available: usize },
    #[error("field `{field}` holds invalid boolean byte 0x{value:02x}")]
    InvalidBool { field: &'static str, value: u8 },
    #[error("unsupported {what} version {found} (expected {expected})")]
    Version { what: &'static str, expected: u8, found: u8 },
    #[error("{0} trailing bytes after the last field")]
    TrailingBytes(usize),
    #[error("byte string of {len} bytes does not fit a 4-byte length prefix")]
    TooLong { len: usize },
}

fn length_prefix(len: usize) -> Result<[u8; 4], FieldError> {
    u32::try_from(len).map(u32::to_le_bytes).map_err(|_| FieldError::TooLong { len })
}

/// Append-only writer producing the canonical field layout.
#[derive(Debug, Default, Clone)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a blob whose first byte is a layout version.
    pub fn versioned(version: u8) -> Self {
        Self { buf: vec![version] }
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_bool(&mut self, value: bool) -> &mut Self {
        self.buf.push(value as u8);
        self
    }

    /// Writes raw bytes with no length prefix. The reader must know the width.
    pub fn put_fixed(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Writes a length-prefixed byte string.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, FieldError> {
        self.buf.extend_from_slice(&length_prefix(bytes.len())?);
        self.buf.extend_from_slice(bytes);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a canonical field blob. Call [`FieldReader::finish`] once all fields are read.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Opens a versioned blob, rejecting any version other than `expected`.
    pub fn versioned(bytes: &'a [u8], what: &'static str, expected: u8) -> Result<Self, FieldError> {
        let mut reader = Self::new(bytes);
        let found = reader.u8(what)?;
        if found != expected {
            return Err(FieldError::Version { what, expected, found });
        }
        Ok(reader)
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8], FieldError> {
        let available = self.remaining();
        if available < needed {
            return Err(FieldError::Truncated { field, needed, available });
        }
        let slice = &self.bytes[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8, FieldError> {
        Ok(self.take(field, 1)?[0])
    }

    pub fn u16(&mut self, field: &'static str) -> Result<u16, FieldError> {
        Ok(u16::from_le_bytes(self.array::<2>(field)?))
    }

    pub fn u64(&mut self, field: &'static str) -> Result<u64, FieldError> {
        Ok(u64::from_le_bytes(self.array::<8>(field)?))
    }

    pub fn bool(&mut self, field: &'static str) -> Result<bool, FieldError> {
        match self.u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(FieldError::InvalidBool { field, value }),
        }
    }

    pub fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], FieldError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    pub fn bytes(&mut self, field: &'static str) -> Result<Vec<u8>, FieldError> {
        let len = u32::from_le_bytes(self.array::<4>(field)?) as usize;
        Ok(self.take(field, len)?.to_vec())
    }

    /// Fails if any bytes are left unread.
    pub fn finish(self) -> Result<(), FieldError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(FieldError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_layout_is_fixed_width_and_little_endian() {
        let mut writer = FieldWriter::versioned(1);
        writer.put_u64(0x0102).put_bool(true).put_bytes(b"ab").unwrap().put_fixed(&[9, 9]);
        assert_eq!(writer.finish(), vec![1, 0x02, 0x01, 0, 0, 0, 0, 0, 0, 1, 2, 0, 0, 0, b'a', b'b', 9, 9]);
    }

    #[test]
    fn reader_reports_field_name_on_truncation() {
        let mut reader = FieldReader::new(&[1, 2, 3]);
        let err = reader.u64("ask").unwrap_err();
        assert_eq!(err, FieldError::Truncated { field: "ask", needed: 8, available: 3 });
    }

    #[test]
    fn reader_rejects_non_canonical_bool() {
        let mut reader = FieldReader::new(&[2]);
        assert_eq!(reader.bool("active").unwrap_err(), FieldError::InvalidBool { field: "active", value: 2 });
    }

    #[test]
    fn reader_rejects_wrong_version_and_trailing_bytes() {
        assert_eq!(
            FieldReader::versioned(&[2, 0], "state", 1).unwrap_err(),
            FieldError::Version { what: "state", expected: 1, found: 2 }
        );

        let mut reader = FieldReader::versioned(&[1, 1, 0xff], "state", 1).unwrap();
        assert!(reader.bool("active").unwrap());
        assert_eq!(reader.finish().unwrap_err(), FieldError::TrailingBytes(1));
    }

    #[test]
    fn length_prefixed_bytes_survive_empty_and_zero_payloads() {
        let mut writer = FieldWriter::new();
        writer.put_bytes(&[]).unwrap().put_bytes(&[0]).unwrap();
        let blob = writer.finish();

        let mut reader = FieldReader::new(&blob);
        assert_eq!(reader.bytes("a").unwrap(), Vec::<u8>::new());
        assert_eq!(reader.bytes("b").unwrap(), vec![0]);
        reader.finish().unwrap();
    }

    #[test]
    fn length_prefix_rejects_lengths_past_u32() {
        assert_eq!(length_prefix(3).unwrap(), [3, 0, 0, 0]);
        assert_eq!(length_prefix(u32::MAX as usize).unwrap(), [0xff; 4]);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(length_prefix(u32::MAX as usize + 1).unwrap_err(), FieldError::TooLong { len: u32::MAX as usize + 1 });
    }
}
