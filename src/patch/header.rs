// Patch header encoding/decoding.
//
// Layout (24 bytes, big-endian):
//   new_len    u32
//   old_len    u32
//   new_digest [u8; 16]

use std::io::{self, Write};

use super::digest::{DIGEST_LEN, Digest};
use super::wire::{self, ByteReader};
use crate::error::PatchError;

/// Encoded header size in bytes.
pub const HEADER_LEN: usize = 4 + 4 + DIGEST_LEN;

/// Largest length the wire format can declare.
///
/// Lengths are stored in 32-bit fields that the format treats as signed, so
/// values with the top bit set are rejected as overflowing.
pub const MAX_LEN: usize = i32::MAX as usize;

/// Lengths and digest recorded when the patch was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
    /// Length of the target ("new") buffer.
    pub new_len: u32,
    /// Length of the base ("old") buffer.
    pub old_len: u32,
    /// Digest of the complete target buffer.
    pub new_digest: Digest,
}

impl PatchHeader {
    pub fn encode<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        wire::write_u32(w, self.new_len)?;
        wire::write_u32(w, self.old_len)?;
        w.write_all(&self.new_digest)
    }

    /// Decode a header from the front of `r`.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, PatchError> {
        let new_len = read_len(r, "target length")?;
        let old_len = read_len(r, "base length")?;
        let new_digest = r
            .read_array::<DIGEST_LEN>()
            .map_err(|e| PatchError::malformed(e.offset, "truncated header digest"))?;
        Ok(Self {
            new_len,
            old_len,
            new_digest,
        })
    }
}

/// Read a declared length and reject values outside `0..=MAX_LEN`.
pub(crate) fn read_len(r: &mut ByteReader<'_>, what: &str) -> Result<u32, PatchError> {
    let offset = r.position();
    let len = r
        .read_u32()
        .map_err(|e| PatchError::malformed(e.offset, format!("truncated {what}")))?;
    if len as usize > MAX_LEN {
        return Err(PatchError::malformed(
            offset,
            format!("{what} {len} overflows the signed 32-bit range"),
        ));
    }
    Ok(len)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PatchHeader {
        PatchHeader {
            new_len: 11,
            old_len: 0x0100,
            new_digest: [0xAB; DIGEST_LEN],
        }
    }

    #[test]
    fn layout_is_fixed() {
        let mut out = Vec::new();
        sample().encode(&mut out).unwrap();
        assert_eq!(out.len(), HEADER_LEN);
        assert_eq!(&out[..8], &[0, 0, 0, 11, 0, 0, 1, 0]);
        assert!(out[8..].iter().all(|&b| b == 0xAB));

        let mut r = ByteReader::new(&out);
        assert_eq!(PatchHeader::decode(&mut r).unwrap(), sample());
        assert!(r.is_empty());
    }

    #[test]
    fn truncated_digest_is_malformed() {
        let mut out = Vec::new();
        sample().encode(&mut out).unwrap();
        let mut r = ByteReader::new(&out[..HEADER_LEN - 1]);
        match PatchHeader::decode(&mut r) {
            Err(PatchError::MalformedPatch { offset, reason }) => {
                assert_eq!(offset, 8);
                assert!(reason.contains("digest"));
            }
            other => panic!("expected MalformedPatch, got {other:?}"),
        }
    }

    #[test]
    fn negative_length_is_rejected() {
        let mut out = Vec::new();
        PatchHeader {
            old_len: 0x8000_0000,
            ..sample()
        }
        .encode(&mut out)
        .unwrap();
        let mut r = ByteReader::new(&out);
        match PatchHeader::decode(&mut r) {
            Err(PatchError::MalformedPatch { offset, .. }) => assert_eq!(offset, 4),
            other => panic!("expected MalformedPatch, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_malformed() {
        let mut r = ByteReader::new(&[]);
        assert!(matches!(
            PatchHeader::decode(&mut r),
            Err(PatchError::MalformedPatch { offset: 0, .. })
        ));
    }
}
