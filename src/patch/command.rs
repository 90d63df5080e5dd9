// Patch commands and the command-stream codec.
//
// Each command is a 1-byte tag and a big-endian u32 length. Insert and
// Delete carry `length` literal bytes after the length field; Equal does not.
// The stream has no terminator: it ends where the input ends.

use std::io::{self, Write};

use super::header::read_len;
use super::wire::{self, ByteReader};
use crate::error::PatchError;

pub const TAG_EQUAL: u8 = 0;
pub const TAG_INSERT: u8 = 1;
pub const TAG_DELETE: u8 = 2;

/// One step of a patch, owning its literal bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Copy `len` bytes from the base cursor to the output.
    Equal { len: u32 },
    /// Append literal target bytes to the output.
    Insert { data: Vec<u8> },
    /// Skip base bytes, which must equal `data`.
    Delete { data: Vec<u8> },
}

/// Borrowed view of a command, as yielded from a serialized stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRef<'a> {
    Equal { len: u32 },
    Insert { data: &'a [u8] },
    Delete { data: &'a [u8] },
}

impl Command {
    pub fn tag(&self) -> u8 {
        match self {
            Self::Equal { .. } => TAG_EQUAL,
            Self::Insert { .. } => TAG_INSERT,
            Self::Delete { .. } => TAG_DELETE,
        }
    }

    /// Declared length of the command.
    pub fn len(&self) -> u32 {
        match self {
            Self::Equal { len } => *len,
            // Literal runs are bounded by MAX_LEN when they are created.
            Self::Insert { data } | Self::Delete { data } => data.len() as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn view(&self) -> CommandRef<'_> {
        match self {
            Self::Equal { len } => CommandRef::Equal { len: *len },
            Self::Insert { data } => CommandRef::Insert { data },
            Self::Delete { data } => CommandRef::Delete { data },
        }
    }

    /// Bytes this command occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        self.view().encoded_len()
    }

    pub fn encode<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        self.view().encode(w)
    }
}

impl<'a> CommandRef<'a> {
    pub fn tag(&self) -> u8 {
        match self {
            Self::Equal { .. } => TAG_EQUAL,
            Self::Insert { .. } => TAG_INSERT,
            Self::Delete { .. } => TAG_DELETE,
        }
    }

    pub fn len(&self) -> u32 {
        match self {
            Self::Equal { len } => *len,
            Self::Insert { data } | Self::Delete { data } => data.len() as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Equal { .. } => 5,
            Self::Insert { data } | Self::Delete { data } => 5 + data.len(),
        }
    }

    pub fn encode<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        wire::write_u8(w, self.tag())?;
        wire::write_u32(w, self.len())?;
        match self {
            Self::Equal { .. } => Ok(()),
            Self::Insert { data } | Self::Delete { data } => w.write_all(data),
        }
    }

    pub fn to_command(&self) -> Command {
        match *self {
            Self::Equal { len } => Command::Equal { len },
            Self::Insert { data } => Command::Insert {
                data: data.to_vec(),
            },
            Self::Delete { data } => Command::Delete {
                data: data.to_vec(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Streaming command iterator
// ---------------------------------------------------------------------------

/// Iterates over the commands of a serialized command stream without
/// copying literal runs.
///
/// The first decode error is yielded once; iteration stops afterwards.
pub struct CommandIterator<'a> {
    reader: ByteReader<'a>,
    failed: bool,
}

impl<'a> CommandIterator<'a> {
    /// Iterate the command stream held in `reader`, starting at its cursor.
    pub fn new(reader: ByteReader<'a>) -> Self {
        Self {
            reader,
            failed: false,
        }
    }

    /// Offset of the next command within the underlying buffer.
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    fn next_command(&mut self) -> Result<CommandRef<'a>, PatchError> {
        let offset = self.reader.position();
        let tag = self
            .reader
            .read_u8()
            .map_err(|e| PatchError::malformed(e.offset, "truncated command tag"))?;
        if tag > TAG_DELETE {
            return Err(PatchError::malformed(
                offset,
                format!("unknown command tag {tag}"),
            ));
        }
        let len = read_len(&mut self.reader, "command length")?;
        match tag {
            TAG_EQUAL => Ok(CommandRef::Equal { len }),
            _ => {
                let data = self.reader.read_bytes(len as usize).map_err(|e| {
                    PatchError::malformed(
                        e.offset,
                        format!(
                            "truncated literal: declared {len} bytes, {} available",
                            e.available
                        ),
                    )
                })?;
                if tag == TAG_INSERT {
                    Ok(CommandRef::Insert { data })
                } else {
                    Ok(CommandRef::Delete { data })
                }
            }
        }
    }
}

impl<'a> Iterator for CommandIterator<'a> {
    type Item = Result<CommandRef<'a>, PatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let item = self.next_command();
        self.failed = item.is_err();
        Some(item)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
