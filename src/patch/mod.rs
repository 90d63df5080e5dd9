// Patch data model and wire format.
//
// # Modules
//
// - `wire`    fixed-width big-endian primitives and the `ByteReader` cursor
// - `digest`  MD5 digest of the target buffer
// - `header`  24-byte patch header
// - `command` Equal/Insert/Delete commands and the streaming iterator
//
// A serialized patch is the header followed by zero or more commands, with
// no terminator and no command count.

pub mod command;
pub mod digest;
pub mod header;
pub mod wire;

use std::io::{self, Write};

pub use command::{Command, CommandIterator, CommandRef, TAG_DELETE, TAG_EQUAL, TAG_INSERT};
pub use digest::{DIGEST_LEN, Digest};
pub use header::{HEADER_LEN, MAX_LEN, PatchHeader};
pub use wire::{ByteReader, ReadError};

use crate::error::PatchError;

/// A complete patch: header plus the ordered command sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub header: PatchHeader,
    pub commands: Vec<Command>,
}

impl Patch {
    /// Write the wire form to `w`.
    pub fn encode<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        self.header.encode(w)?;
        for command in &self.commands {
            command.encode(w)?;
        }
        Ok(())
    }

    /// Serialize into a freshly allocated buffer of exactly
    /// [`serialized_len`](Self::serialized_len) bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_len());
        // Writing into a Vec cannot fail.
        let _ = self.encode(&mut out);
        out
    }

    pub fn serialized_len(&self) -> usize {
        HEADER_LEN
            + self
                .commands
                .iter()
                .map(Command::encoded_len)
                .sum::<usize>()
    }

    /// Parse a complete serialized patch.
    pub fn decode(data: &[u8]) -> Result<Self, PatchError> {
        let (header, commands) = split(data)?;
        let commands = commands
            .map(|c| c.map(|c| c.to_command()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { header, commands })
    }

    /// Total bytes carried as Insert literals.
    pub fn inserted_bytes(&self) -> usize {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Insert { data } => Some(data.len()),
                _ => None,
            })
            .sum()
    }

    /// Total bytes carried as Delete literals.
    pub fn deleted_bytes(&self) -> usize {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Delete { data } => Some(data.len()),
                _ => None,
            })
            .sum()
    }
}

/// Decode the header of a serialized patch and return an iterator over the
/// remaining command stream.
pub fn split(data: &[u8]) -> Result<(PatchHeader, CommandIterator<'_>), PatchError> {
    let mut reader = ByteReader::new(data);
    let header = PatchHeader::decode(&mut reader)?;
    Ok((header, CommandIterator::new(reader)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Patch {
        Patch {
            header: PatchHeader {
                new_len: 7,
                old_len: 7,
                new_digest: [9; DIGEST_LEN],
            },
            commands: vec![
                Command::Equal { len: 3 },
                Command::Insert { data: b"X".to_vec() },
                Command::Delete { data: b"Y".to_vec() },
                Command::Equal { len: 3 },
            ],
        }
    }

    #[test]
    fn serialized_len_matches_encoding() {
        let patch = sample();
        let bytes = patch.to_bytes();
        assert_eq!(bytes.len(), patch.serialized_len());
        assert_eq!(bytes.len(), HEADER_LEN + 5 + 6 + 6 + 5);
        assert_eq!(Patch::decode(&bytes).unwrap(), patch);
    }

    #[test]
    fn header_only_patch_has_no_commands() {
        let patch = Patch {
            header: PatchHeader {
                new_len: 0,
                old_len: 0,
                new_digest: [0; DIGEST_LEN],
            },
            commands: Vec::new(),
        };
        let bytes = patch.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert!(Patch::decode(&bytes).unwrap().commands.is_empty());
    }

    #[test]
    fn literal_byte_counts() {
        let patch = sample();
        assert_eq!(patch.inserted_bytes(), 1);
        assert_eq!(patch.deleted_bytes(), 1);
    }

    #[test]
    fn every_truncation_is_rejected() {
        let bytes = sample().to_bytes();
        // Command boundaries decode as a shorter valid stream; every other
        // cut must be reported as malformed.
        let boundaries = [HEADER_LEN, HEADER_LEN + 5, HEADER_LEN + 11, HEADER_LEN + 17];
        for cut in 0..bytes.len() {
            let result = Patch::decode(&bytes[..cut]);
            if boundaries.contains(&cut) {
                assert!(result.is_ok(), "cut at {cut} should decode");
            } else {
                assert!(
                    matches!(result, Err(PatchError::MalformedPatch { .. })),
                    "cut at {cut} should be malformed"
                );
            }
        }
    }
}
