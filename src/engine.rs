// Patch engine: ties the differencer, the applier and compression together.
//
// Provides high-level create/apply APIs over in-memory buffers and over
// readers/writers:
//   - create: diff -> serialize -> compress (optional, whole blob)
//   - apply:  decompress (optional, whole blob) -> replay from wire form

use std::io::{Read, Write};

use log::debug;

use crate::apply::{self, ApplyOptions};
use crate::compress::{self, Compression};
use crate::diff::{self, DiffOptions};
use crate::error::PatchError;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for creating and applying patch blobs.
#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    pub diff: DiffOptions,
    pub apply: ApplyOptions,
    /// Compression wrapped around the serialized patch. Both sides must
    /// agree on it; the blob carries no marker.
    pub compression: Compression,
}

impl PatchOptions {
    /// Default options with the given compression.
    pub fn with_compression(compression: Compression) -> Self {
        Self {
            compression,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory API
// ---------------------------------------------------------------------------

/// Create a patch blob that turns `old` into `new`.
pub fn create(new: &[u8], old: &[u8], opts: &PatchOptions) -> Result<Vec<u8>, PatchError> {
    let patch = diff::diff_with_options(new, old, &opts.diff)?;
    let serialized = patch.to_bytes();
    let blob = wrap(serialized, &opts.compression)?;
    debug!(
        "create: commands={} serialized={} blob={} compression={}",
        patch.commands.len(),
        patch.serialized_len(),
        blob.len(),
        opts.compression.name()
    );
    Ok(blob)
}

/// Reconstruct the target from a patch blob and the base buffer.
pub fn apply(blob: &[u8], old: &[u8], opts: &PatchOptions) -> Result<Vec<u8>, PatchError> {
    match opts.compression.backend() {
        None => apply::apply_bytes(blob, old, &opts.apply),
        Some(backend) => {
            let serialized =
                compress::decompress_bytes(backend.as_ref(), blob).map_err(PatchError::Compression)?;
            debug!(
                "apply: blob={} serialized={} compression={}",
                blob.len(),
                serialized.len(),
                backend.name()
            );
            apply::apply_bytes(&serialized, old, &opts.apply)
        }
    }
}

/// Remove the compression layer, returning the serialized patch.
pub fn unwrap_blob(blob: &[u8], compression: &Compression) -> Result<Vec<u8>, PatchError> {
    match compression.backend() {
        None => Ok(blob.to_vec()),
        Some(backend) => {
            compress::decompress_bytes(backend.as_ref(), blob).map_err(PatchError::Compression)
        }
    }
}

/// Apply the configured compression to a serialized patch.
pub(crate) fn wrap(serialized: Vec<u8>, compression: &Compression) -> Result<Vec<u8>, PatchError> {
    match compression.backend() {
        None => Ok(serialized),
        Some(backend) => {
            compress::compress_bytes(backend.as_ref(), &serialized).map_err(PatchError::Compression)
        }
    }
}

// ---------------------------------------------------------------------------
// Stream API
// ---------------------------------------------------------------------------

fn read_all(mut r: impl Read) -> Result<Vec<u8>, PatchError> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf).map_err(PatchError::Io)?;
    Ok(buf)
}

/// Read both sources to the end and write the patch blob to `out`.
///
/// Returns the number of bytes written.
pub fn create_from_readers(
    new: impl Read,
    old: impl Read,
    mut out: impl Write,
    opts: &PatchOptions,
) -> Result<u64, PatchError> {
    let new = read_all(new)?;
    let old = read_all(old)?;
    let blob = create(&new, &old, opts)?;
    out.write_all(&blob).map_err(PatchError::Io)?;
    out.flush().map_err(PatchError::Io)?;
    Ok(blob.len() as u64)
}

/// Read the patch blob and the base to the end and write the reconstructed
/// target to `out`. Nothing is written unless the result verifies.
///
/// Returns the number of bytes written.
pub fn apply_from_readers(
    patch: impl Read,
    old: impl Read,
    mut out: impl Write,
    opts: &PatchOptions,
) -> Result<u64, PatchError> {
    let blob = read_all(patch)?;
    let old = read_all(old)?;
    let new = apply(&blob, &old, opts)?;
    out.write_all(&new).map_err(PatchError::Io)?;
    out.flush().map_err(PatchError::Io)?;
    Ok(new.len() as u64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
