//! # Byte Codec
//!
//! Big-endian, length-prefixed primitives shared by every Warp wire type.
//! Reads never panic: any overrun yields a [`ParseError`].

use super::errors::ParseError;

/// Maximum encoded size of an unsigned message (2 MiB minus framing margin).
pub const MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024 - 512;

/// Appends fields to a growable buffer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create a writer with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Write a single byte.
    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write a big-endian u16.
    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a big-endian u32.
    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a big-endian u64.
    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write raw bytes with no prefix.
    pub fn put_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write `len (u32 BE) ‖ bytes`.
    pub fn put_var_bytes(&mut self, bytes: &[u8]) -> Result<(), ParseError> {
        let len = u32::try_from(bytes.len()).map_err(|_| ParseError::Oversize {
            size: bytes.len(),
            max: u32::MAX as usize,
        })?;
        self.put_u32(len);
        self.put_fixed(bytes);
        Ok(())
    }

    /// Current length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over borrowed input.
#[derive(Debug)]
pub struct ByteReader<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// Start reading at offset 0.
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, offset: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.input.len() - self.offset
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        if self.remaining() < n {
            return Err(ParseError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.input[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    /// Read a single byte.
    pub fn get_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian u16.
    pub fn get_u16(&mut self) -> Result<u16, ParseError> {
        let bytes = self.get_fixed::<2>()?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Read a big-endian u32.
    pub fn get_u32(&mut self) -> Result<u32, ParseError> {
        let bytes = self.get_fixed::<4>()?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Read a big-endian u64.
    pub fn get_u64(&mut self) -> Result<u64, ParseError> {
        let bytes = self.get_fixed::<8>()?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Read exactly `N` bytes.
    pub fn get_fixed<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read `len (u32 BE) ‖ bytes`.
    pub fn get_var_bytes(&mut self) -> Result<&'a [u8], ParseError> {
        let len = self.get_u32()? as usize;
        self.take(len)
    }

    /// Fail if any input is left.
    pub fn finish(self) -> Result<(), ParseError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(ParseError::TrailingBytes(n)),
        }
    }
}

/// Reject inputs over `max` bytes.
pub fn check_size(size: usize, max: usize) -> Result<(), ParseError> {
    if size > max {
        return Err(ParseError::Oversize { size, max });
    }
    Ok(())
}
