// Error taxonomy for diffing, applying and decoding patches.
//
// Every check in the applier maps to exactly one variant so callers can tell
// a wrong base file apart from a corrupted patch without parsing messages.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::patch::digest::Digest;

/// Errors produced by the differencer, the applier and the patch codec.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The base buffer's length disagrees with the length recorded in the
    /// patch header. The patch was built against a different base.
    #[error("patch not applicable: base size mismatch, expected {expected}, actual {actual}")]
    SizeMismatch { expected: u32, actual: usize },

    /// A Delete command's literal disagrees with the base bytes under the
    /// cursor. The base is the wrong version or is corrupted.
    #[error("patch not applicable: base content mismatch at offset {offset} ({len} bytes)")]
    ContentMismatch { offset: usize, len: u32 },

    /// Replay finished with base bytes left over.
    #[error("patch application failed: base consumed {consumed} of {total} bytes")]
    IncompleteConsumption { consumed: usize, total: usize },

    /// The reconstructed buffer's digest disagrees with the header.
    #[error("patch application failed: digest mismatch, expected {}, actual {}", Hex(.expected), Hex(.actual))]
    DigestMismatch { expected: Digest, actual: Digest },

    /// The reconstructed length disagrees with the header. Only raised when
    /// strict length checking is enabled; otherwise logged as a warning.
    #[error("patch application failed: output length mismatch, expected {expected}, actual {actual}")]
    LengthMismatch { expected: u32, actual: usize },

    /// Structural decode failure: unknown tag, truncated field, or a
    /// declared length outside the representable range.
    #[error("malformed patch at byte {offset}: {reason}")]
    MalformedPatch { offset: usize, reason: String },

    /// The digest backend is not available in this build.
    #[error("digest unavailable: {0}")]
    DigestUnavailable(String),

    /// An input buffer is too long to be described by the wire format.
    #[error("input of {len} bytes exceeds the maximum patchable length")]
    InputTooLarge { len: usize },

    /// Rejected differencer or applier options.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The compression collaborator failed while wrapping or unwrapping the
    /// serialized patch.
    #[error("compression error: {0}")]
    Compression(#[source] io::Error),

    /// Reading a source or writing the result through a caller-supplied
    /// stream failed.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl PatchError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedPatch {
            offset,
            reason: reason.into(),
        }
    }

    /// True when the failure points at the base buffer rather than the patch.
    pub fn is_base_mismatch(&self) -> bool {
        matches!(self, Self::SizeMismatch { .. } | Self::ContentMismatch { .. })
    }

    /// True when the failure points at a damaged or incompatible patch.
    pub fn is_corrupt_patch(&self) -> bool {
        matches!(
            self,
            Self::DigestMismatch { .. }
                | Self::LengthMismatch { .. }
                | Self::MalformedPatch { .. }
                | Self::IncompleteConsumption { .. }
        )
    }
}

/// Lower-case hex rendering for digests in messages.
pub(crate) struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
