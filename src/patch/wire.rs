// Fixed-width binary primitives for the patch wire format.
//
// All integers are big-endian. Reading goes through `ByteReader`, an explicit
// cursor over a borrowed slice, so truncation is reported with the offset it
// happened at instead of surfacing as a generic end-of-stream.

use std::io::{self, Write};

use thiserror::Error;

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write a single byte.
#[inline]
pub fn write_u8<W: Write + ?Sized>(w: &mut W, value: u8) -> io::Result<()> {
    w.write_all(&[value])
}

/// Write a big-endian `u32`.
#[inline]
pub fn write_u32<W: Write + ?Sized>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// A read attempt ran past the end of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("truncated input at byte {offset}: needed {needed} bytes, {available} available")]
pub struct ReadError {
    /// Cursor position when the read was attempted.
    pub offset: usize,
    /// Bytes the read required.
    pub needed: usize,
    /// Bytes left in the input.
    pub available: usize,
}

/// Cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current cursor position.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        if len > self.remaining() {
            return Err(ReadError {
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a big-endian `u32`.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        Ok(u32::from_be_bytes(self.read_array::<4>()?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_is_big_endian() {
        let mut out = Vec::new();
        write_u32(&mut out, 0x0102_0304).unwrap();
        assert_eq!(out, [0x01, 0x02, 0x03, 0x04]);

        let mut r = ByteReader::new(&out);
        assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
        assert!(r.is_empty());
    }

    #[test]
    fn cursor_tracks_position() {
        let data = [7u8, 0, 0, 0, 11, b'a', b'b'];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.position(), 1);
        assert_eq!(r.read_u32().unwrap(), 11);
        assert_eq!(r.remaining(), 2);
        assert_eq!(r.read_bytes(2).unwrap(), b"ab");
        assert_eq!(r.position(), data.len());
    }

    #[test]
    fn truncated_read_reports_offset() {
        let data = [0u8, 1, 2];
        let mut r = ByteReader::new(&data);
        r.read_u8().unwrap();
        let err = r.read_u32().unwrap_err();
        assert_eq!(
            err,
            ReadError {
                offset: 1,
                needed: 4,
                available: 2
            }
        );
        // A failed read leaves the cursor where it was.
        assert_eq!(r.position(), 1);
    }

    #[test]
    fn zero_length_read_at_end() {
        let mut r = ByteReader::new(&[]);
        assert_eq!(r.read_bytes(0).unwrap(), b"");
        assert!(r.read_u8().is_err());
    }
}
