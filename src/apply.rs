// Patch applier.
//
// Replays commands against the base buffer and verifies the result. Checks
// run eagerly in this order and stop at the first failure:
//   1. base length equals the header's base length        -> SizeMismatch
//   2. Equal/Delete stay inside the base buffer            -> MalformedPatch
//   3. Delete literals equal the base bytes they skip      -> ContentMismatch
//   4. the base buffer is fully consumed                   -> IncompleteConsumption
//   5. the output digest equals the header digest          -> DigestMismatch
//   6. the output length equals the header's target length -> warning, or
//      LengthMismatch in strict mode
// The partially built output is dropped on any error.

use log::{debug, trace, warn};

use crate::error::PatchError;
use crate::patch::{self, CommandRef, Patch, PatchHeader, digest};

/// Upper bound on the output capacity reserved from the header alone.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// Applier configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Fail with [`PatchError::LengthMismatch`] instead of logging a warning
    /// when the reconstructed length disagrees with the header.
    pub strict_length: bool,
}

/// Apply a decoded patch to `old` with default options.
pub fn apply(patch: &Patch, old: &[u8]) -> Result<Vec<u8>, PatchError> {
    apply_with_options(patch, old, &ApplyOptions::default())
}

/// Apply a decoded patch to `old`.
pub fn apply_with_options(
    patch: &Patch,
    old: &[u8],
    opts: &ApplyOptions,
) -> Result<Vec<u8>, PatchError> {
    let mut replay = Replay::new(&patch.header, old)?;
    for command in &patch.commands {
        replay.step(command.view())?;
    }
    replay.finish(opts)
}

/// Apply a serialized (uncompressed) patch to `old`, replaying straight from
/// the wire form without materializing the command list.
pub fn apply_bytes(data: &[u8], old: &[u8], opts: &ApplyOptions) -> Result<Vec<u8>, PatchError> {
    let (header, commands) = patch::split(data)?;
    let mut replay = Replay::new(&header, old)?;
    for command in commands {
        replay.step(command?)?;
    }
    replay.finish(opts)
}

// ---------------------------------------------------------------------------
// Replay state
// ---------------------------------------------------------------------------

struct Replay<'a> {
    header: PatchHeader,
    old: &'a [u8],
    /// Cursor into `old`.
    pos: usize,
    out: Vec<u8>,
    steps: usize,
}

impl<'a> Replay<'a> {
    fn new(header: &PatchHeader, old: &'a [u8]) -> Result<Self, PatchError> {
        if old.len() != header.old_len as usize {
            return Err(PatchError::SizeMismatch {
                expected: header.old_len,
                actual: old.len(),
            });
        }
        Ok(Self {
            header: *header,
            old,
            pos: 0,
            out: Vec::with_capacity((header.new_len as usize).min(MAX_PREALLOC)),
            steps: 0,
        })
    }

    /// Borrow the next `len` base bytes, checking the command stays in range.
    fn take_base(&mut self, len: u32, what: &str) -> Result<&'a [u8], PatchError> {
        let len = len as usize;
        let end = self.pos + len;
        if end > self.old.len() {
            return Err(PatchError::malformed(
                self.pos,
                format!(
                    "command {}: {what} of {len} bytes exceeds base length {}",
                    self.steps,
                    self.old.len()
                ),
            ));
        }
        let bytes = &self.old[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn step(&mut self, command: CommandRef<'_>) -> Result<(), PatchError> {
        trace!("step {}: tag={} len={}", self.steps, command.tag(), command.len());
        match command {
            CommandRef::Equal { len } => {
                let bytes = self.take_base(len, "equal")?;
                self.out.extend_from_slice(bytes);
            }
            CommandRef::Insert { data } => {
                self.out.extend_from_slice(data);
            }
            CommandRef::Delete { data } => {
                let offset = self.pos;
                let expected = self.take_base(command.len(), "delete")?;
                if expected != data {
                    return Err(PatchError::ContentMismatch {
                        offset,
                        len: command.len(),
                    });
                }
            }
        }
        self.steps += 1;
        Ok(())
    }

    fn finish(self, opts: &ApplyOptions) -> Result<Vec<u8>, PatchError> {
        if self.pos != self.old.len() {
            return Err(PatchError::IncompleteConsumption {
                consumed: self.pos,
                total: self.old.len(),
            });
        }

        digest::verify(&self.out, &self.header.new_digest)?;

        if self.out.len() != self.header.new_len as usize {
            if opts.strict_length {
                return Err(PatchError::LengthMismatch {
                    expected: self.header.new_len,
                    actual: self.out.len(),
                });
            }
            warn!(
                "size mismatch after applying patch: expected {}, actual {}",
                self.header.new_len,
                self.out.len()
            );
        }

        debug!(
            "apply: base={} output={} commands={}",
            self.old.len(),
            self.out.len(),
            self.steps
        );
        Ok(self.out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
