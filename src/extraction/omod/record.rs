//! Readers for the records an OMOD package stores as .NET binary data

use crate::error::Error;
use std::fmt;
use std::path::Path;

/// A structural problem found while parsing package metadata
#[derive(Debug)]
pub(crate) struct FormatError(pub(crate) String);

impl FormatError {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// Attach the package path
    pub(crate) fn into_error(self, path: &Path) -> Error {
        Error::fault(path, self.0)
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Error> for FormatError {
    fn from(e: Error) -> Self {
        Self(e.to_string())
    }
}

pub(crate) type FormatResult<T> = std::result::Result<T, FormatError>;

/// Little-endian cursor over one record
pub(crate) struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> FormatResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                FormatError::new(format!("record truncated at byte {} (needed {n})", self.pos))
            })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> FormatResult<[u8; N]> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    pub(crate) fn u8(&mut self) -> FormatResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u32(&mut self) -> FormatResult<u32> {
        self.array().map(u32::from_le_bytes)
    }

    pub(crate) fn i32(&mut self) -> FormatResult<i32> {
        self.array().map(i32::from_le_bytes)
    }

    pub(crate) fn i64(&mut self) -> FormatResult<i64> {
        self.array().map(i64::from_le_bytes)
    }

    /// String with a 7-bit variable-length byte count, as .NET writes them
    pub(crate) fn string(&mut self) -> FormatResult<String> {
        let mut len = 0usize;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            len |= usize::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift > 28 {
                return Err(FormatError::new("string length prefix too long"));
            }
        }
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
