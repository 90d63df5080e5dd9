// File-level patch operations.
//
// Provides `create_patch_file()` and `apply_patch_file()` which check their
// path preconditions, run the in-memory engine, and only then write the
// result. Outputs are staged in a sibling temp file and renamed into place,
// so a failed operation never leaves a partial file at the destination.
//
// `create_patch_temp()` and `apply_patch_temp()` allocate the destination
// themselves (`diff*.sdiff` / `diff*.tmp` in the system temp dir). The
// `*_with` forms take an `Overwrite` policy for existing destinations.
//
// SHA-256 checksums of the written target are computed while writing when
// the `file-io` feature is enabled.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
#[cfg(feature = "file-io")]
use sha2::Digest;
use thiserror::Error;

use crate::diff;
use crate::engine::{self, PatchOptions};
use crate::error::PatchError;

/// Patch paths with this suffix may be overwritten.
pub const SCRATCH_PATCH_SUFFIX: &str = ".sdiff";
/// Output paths with this suffix may be overwritten.
pub const SCRATCH_OUTPUT_SUFFIX: &str = ".tmp";
/// Prefix of files allocated by the temp-file forms.
pub const TEMP_PREFIX: &str = "diff";

const BUF_SIZE: usize = 64 * 1024;

/// Policy for a destination that already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Overwrite {
    /// Replace only scratch files (`.sdiff` patches, `.tmp` outputs).
    #[default]
    ScratchOnly,
    /// Replace any existing file once the new content has been built.
    Always,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `create_patch_file()`.
#[derive(Debug, Clone)]
pub struct CreateStats {
    /// Target ("new") file size in bytes.
    pub new_size: u64,
    /// Base ("old") file size in bytes.
    pub old_size: u64,
    /// Serialized patch size before compression.
    pub serialized_size: u64,
    /// Bytes written to the patch file.
    pub patch_size: u64,
    /// Number of commands in the patch.
    pub commands: usize,
    /// Literal bytes carried by Insert commands.
    pub inserted_bytes: u64,
    /// Literal bytes carried by Delete commands.
    pub deleted_bytes: u64,
    /// SHA-256 of the target file (if `file-io` feature is enabled).
    pub new_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `apply_patch_file()`.
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// Base file size in bytes.
    pub old_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// SHA-256 of the reconstructed output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file operations.
#[derive(Debug, Error)]
pub enum IoError {
    /// I/O error (file open, read, write, rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Diff, apply or compression failure.
    #[error(transparent)]
    Patch(#[from] PatchError),
    /// A required input file does not exist.
    #[error("{role} file not found: {}", path.display())]
    NotFound { role: &'static str, path: PathBuf },
    /// The destination exists and is not a scratch file.
    #[error("{role} file already exists: {}", path.display())]
    AlreadyExists { role: &'static str, path: PathBuf },
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

fn require_file(path: &Path, role: &'static str) -> Result<(), IoError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(IoError::NotFound {
            role,
            path: path.to_path_buf(),
        })
    }
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(suffix))
}

/// Where and how the result is written.
struct Destination<'a> {
    path: &'a Path,
    role: &'static str,
    /// An existing file at `path` may be replaced.
    replace: bool,
}

impl<'a> Destination<'a> {
    fn new(path: &'a Path, role: &'static str, scratch_suffix: &str, overwrite: Overwrite) -> Self {
        Self {
            path,
            role,
            replace: overwrite == Overwrite::Always || has_suffix(path, scratch_suffix),
        }
    }

    fn already_exists(&self) -> IoError {
        IoError::AlreadyExists {
            role: self.role,
            path: self.path.to_path_buf(),
        }
    }

    /// Early check; `write_atomic` re-checks when it renames into place.
    fn require_writable(&self) -> Result<(), IoError> {
        if !self.replace && self.path.exists() {
            return Err(self.already_exists());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Atomic write
// ---------------------------------------------------------------------------

/// Write `data` to a temp file next to the destination, then rename it into
/// place. Without `replace` the rename fails if the destination appeared in
/// the meantime. Returns the SHA-256 of the written bytes when `file-io` is
/// enabled.
fn write_atomic(dest: &Destination<'_>, data: &[u8]) -> Result<Option<[u8; 32]>, IoError> {
    let dir = match dest.path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".sdiff-staging")
        .tempfile_in(dir)?;

    let mut writer = BufWriter::with_capacity(BUF_SIZE, staged);

    #[cfg(feature = "file-io")]
    let sha256 = {
        let mut hasher = sha2::Sha256::new();
        let mut hashing = HashingWriter {
            inner: &mut writer,
            hasher: &mut hasher,
        };
        hashing.write_all(data)?;
        Some(hasher.finalize().into())
    };
    #[cfg(not(feature = "file-io"))]
    let sha256: Option<[u8; 32]> = {
        writer.write_all(data)?;
        None
    };

    let staged = writer.into_inner().map_err(|e| e.into_error())?;
    staged.as_file().sync_all()?;
    let persisted = if dest.replace {
        staged.persist(dest.path)
    } else {
        staged.persist_noclobber(dest.path)
    };
    match persisted {
        Ok(_) => Ok(sha256),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Err(dest.already_exists()),
        Err(e) => Err(IoError::Io(e.error)),
    }
}

// ---------------------------------------------------------------------------
// create_patch_file
// ---------------------------------------------------------------------------

/// Create a patch that turns `old_path` into `new_path`, writing it to
/// `patch_path`.
///
/// Fails if either input is missing, or if `patch_path` exists and its name
/// does not end in `.sdiff`.
pub fn create_patch_file(
    new_path: &Path,
    old_path: &Path,
    patch_path: &Path,
    opts: &PatchOptions,
) -> Result<CreateStats, IoError> {
    create_patch_file_with(new_path, old_path, patch_path, opts, Overwrite::default())
}

/// [`create_patch_file`] with an explicit policy for an existing patch file.
/// An existing file is only replaced after the patch has been built.
pub fn create_patch_file_with(
    new_path: &Path,
    old_path: &Path,
    patch_path: &Path,
    opts: &PatchOptions,
    overwrite: Overwrite,
) -> Result<CreateStats, IoError> {
    let dest = Destination::new(patch_path, "patch", SCRATCH_PATCH_SUFFIX, overwrite);
    require_file(new_path, "new")?;
    require_file(old_path, "old")?;
    dest.require_writable()?;

    let new = fs::read(new_path)?;
    let old = fs::read(old_path)?;

    let patch = diff::diff_with_options(&new, &old, &opts.diff)?;
    let serialized = patch.to_bytes();
    let blob = engine::wrap(serialized, &opts.compression)?;

    write_atomic(&dest, &blob)?;

    #[cfg(feature = "file-io")]
    let new_sha256 = Some(sha2::Sha256::digest(&new).into());
    #[cfg(not(feature = "file-io"))]
    let new_sha256: Option<[u8; 32]> = None;

    debug!(
        "wrote patch {} ({} bytes, {} commands)",
        patch_path.display(),
        blob.len(),
        patch.commands.len()
    );

    Ok(CreateStats {
        new_size: new.len() as u64,
        old_size: old.len() as u64,
        serialized_size: patch.serialized_len() as u64,
        patch_size: blob.len() as u64,
        commands: patch.commands.len(),
        inserted_bytes: patch.inserted_bytes() as u64,
        deleted_bytes: patch.deleted_bytes() as u64,
        new_sha256,
    })
}

// ---------------------------------------------------------------------------
// apply_patch_file
// ---------------------------------------------------------------------------

/// Apply the patch at `patch_path` to `target_path`, writing the
/// reconstructed file to `output_path`.
///
/// Fails if either input is missing, or if `output_path` exists and its name
/// does not end in `.tmp`. The output is written only after the result has
/// been verified.
pub fn apply_patch_file(
    patch_path: &Path,
    target_path: &Path,
    output_path: &Path,
    opts: &PatchOptions,
) -> Result<ApplyStats, IoError> {
    apply_patch_file_with(patch_path, target_path, output_path, opts, Overwrite::default())
}

/// [`apply_patch_file`] with an explicit policy for an existing output file.
/// An existing file is only replaced by a verified result.
pub fn apply_patch_file_with(
    patch_path: &Path,
    target_path: &Path,
    output_path: &Path,
    opts: &PatchOptions,
    overwrite: Overwrite,
) -> Result<ApplyStats, IoError> {
    let dest = Destination::new(output_path, "output", SCRATCH_OUTPUT_SUFFIX, overwrite);
    require_file(patch_path, "patch")?;
    require_file(target_path, "target")?;
    dest.require_writable()?;

    let blob = fs::read(patch_path)?;
    let old = fs::read(target_path)?;
    let new = engine::apply(&blob, &old, opts)?;

    let output_sha256 = write_atomic(&dest, &new)?;

    debug!(
        "wrote {} ({} bytes) from patch {}",
        output_path.display(),
        new.len(),
        patch_path.display()
    );

    Ok(ApplyStats {
        patch_size: blob.len() as u64,
        old_size: old.len() as u64,
        output_size: new.len() as u64,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Temp-file forms
// ---------------------------------------------------------------------------

/// Create a patch in a fresh `diff*.sdiff` temp file and return its path.
///
/// The temp file is removed if the operation fails; on success the caller
/// owns it.
pub fn create_patch_temp(
    new_path: &Path,
    old_path: &Path,
    opts: &PatchOptions,
) -> Result<PathBuf, IoError> {
    let temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(SCRATCH_PATCH_SUFFIX)
        .tempfile()?
        .into_temp_path();
    create_patch_file(new_path, old_path, &temp, opts)?;
    temp.keep().map_err(|e| IoError::Io(e.error))
}

/// Apply a patch into a fresh `diff*.tmp` temp file and return its path.
///
/// The temp file is removed if the operation fails; on success the caller
/// owns it.
pub fn apply_patch_temp(
    patch_path: &Path,
    target_path: &Path,
    opts: &PatchOptions,
) -> Result<PathBuf, IoError> {
    let temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(SCRATCH_OUTPUT_SUFFIX)
        .tempfile()?
        .into_temp_path();
    apply_patch_file(patch_path, target_path, &temp, opts)?;
    temp.keep().map_err(|e| IoError::Io(e.error))
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(all(test, feature = "md5"))]
mod tests {
    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn file(&self, name: &str, data: &[u8]) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, data).unwrap();
            path
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }
    }

    #[test]
    fn create_apply_file_roundtrip() {
        let fx = Fixture::new();
        let new_data = b"The quick brown cat sits on the lazy mat. 1234567890!!!";
        let old_data = b"The quick brown fox jumps over the lazy dog. 1234567890";
        let new = fx.file("new.bin", new_data);
        let old = fx.file("old.bin", old_data);
        let patch = fx.path("patch.bin");
        let out = fx.path("out.bin");

        let opts = PatchOptions::default();
        let cs = create_patch_file(&new, &old, &patch, &opts).unwrap();
        assert_eq!(cs.new_size, new_data.len() as u64);
        assert_eq!(cs.old_size, old_data.len() as u64);
        assert_eq!(cs.patch_size, fs::metadata(&patch).unwrap().len());
        assert!(cs.commands > 0);

        let applied = apply_patch_file(&patch, &old, &out, &opts).unwrap();
        assert_eq!(applied.output_size, new_data.len() as u64);
        assert_eq!(fs::read(&out).unwrap(), new_data);
    }

    #[test]
    fn missing_inputs_are_reported_by_role() {
        let fx = Fixture::new();
        let present = fx.file("present", b"x");
        let missing = fx.path("missing");
        let opts = PatchOptions::default();

        match create_patch_file(&missing, &present, &fx.path("p"), &opts) {
            Err(IoError::NotFound { role: "new", .. }) => {}
            other => panic!("expected NotFound(new), got {other:?}"),
        }
        match create_patch_file(&present, &missing, &fx.path("p"), &opts) {
            Err(IoError::NotFound { role: "old", .. }) => {}
            other => panic!("expected NotFound(old), got {other:?}"),
        }
        match apply_patch_file(&missing, &present, &fx.path("o"), &opts) {
            Err(IoError::NotFound { role: "patch", .. }) => {}
            other => panic!("expected NotFound(patch), got {other:?}"),
        }
        match apply_patch_file(&present, &missing, &fx.path("o"), &opts) {
            Err(IoError::NotFound { role: "target", .. }) => {}
            other => panic!("expected NotFound(target), got {other:?}"),
        }
    }

    #[test]
    fn existing_destination_requires_scratch_suffix() {
        let fx = Fixture::new();
        let new = fx.file("new", b"abcdef");
        let old = fx.file("old", b"abcxyz");
        let opts = PatchOptions::default();

        let taken = fx.file("patch.bin", b"keep me");
        assert!(matches!(
            create_patch_file(&new, &old, &taken, &opts),
            Err(IoError::AlreadyExists { role: "patch", .. })
        ));
        assert_eq!(fs::read(&taken).unwrap(), b"keep me");

        let scratch = fx.file("patch.sdiff", b"stale");
        create_patch_file(&new, &old, &scratch, &opts).unwrap();

        let taken_out = fx.file("out.bin", b"keep me too");
        assert!(matches!(
            apply_patch_file(&scratch, &old, &taken_out, &opts),
            Err(IoError::AlreadyExists { role: "output", .. })
        ));

        let scratch_out = fx.file("out.tmp", b"stale");
        apply_patch_file(&scratch, &old, &scratch_out, &opts).unwrap();
        assert_eq!(fs::read(&scratch_out).unwrap(), b"abcdef");
    }

    #[test]
    fn failed_apply_leaves_no_output() {
        let fx = Fixture::new();
        let new = fx.file("new", b"abcdef");
        let old = fx.file("old", b"abcxyz");
        let wrong = fx.file("wrong", b"abcxyzz");
        let patch = fx.path("p.sdiff");
        let out = fx.path("out.bin");
        let opts = PatchOptions::default();

        create_patch_file(&new, &old, &patch, &opts).unwrap();
        let err = apply_patch_file(&patch, &wrong, &out, &opts).unwrap_err();
        assert!(matches!(
            err,
            IoError::Patch(PatchError::SizeMismatch { .. })
        ));
        assert!(!out.exists());
        // Only the inputs and the patch remain; no staging leftovers.
        assert_eq!(fs::read_dir(fx.dir.path()).unwrap().count(), 4);
    }

    #[test]
    fn temp_forms_use_scratch_names() {
        let fx = Fixture::new();
        let new = fx.file("new", b"hello brave new world");
        let old = fx.file("old", b"hello old world");
        let opts = PatchOptions::default();

        let patch = create_patch_temp(&new, &old, &opts).unwrap();
        let name = patch.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(TEMP_PREFIX) && name.ends_with(SCRATCH_PATCH_SUFFIX));

        let out = apply_patch_temp(&patch, &old, &opts).unwrap();
        let name = out.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(TEMP_PREFIX) && name.ends_with(SCRATCH_OUTPUT_SUFFIX));
        assert_eq!(fs::read(&out).unwrap(), b"hello brave new world");

        fs::remove_file(&patch).unwrap();
        fs::remove_file(&out).unwrap();
    }

    #[test]
    fn overwrite_always_replaces_only_after_success() {
        let fx = Fixture::new();
        let new = fx.file("new", b"abcdef");
        let old = fx.file("old", b"abcxyz");
        let wrong = fx.file("wrong", b"abcxyq");
        let patch = fx.file("patch.bin", b"precious patch");
        let out = fx.file("out.bin", b"precious output");
        let opts = PatchOptions::default();

        assert!(matches!(
            create_patch_file_with(&fx.path("missing"), &old, &patch, &opts, Overwrite::Always),
            Err(IoError::NotFound { role: "new", .. })
        ));
        assert_eq!(fs::read(&patch).unwrap(), b"precious patch");

        create_patch_file_with(&new, &old, &patch, &opts, Overwrite::Always).unwrap();
        assert_ne!(fs::read(&patch).unwrap(), b"precious patch");

        assert!(apply_patch_file_with(&patch, &wrong, &out, &opts, Overwrite::Always).is_err());
        assert_eq!(fs::read(&out).unwrap(), b"precious output");

        apply_patch_file_with(&patch, &old, &out, &opts, Overwrite::Always).unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"abcdef");
    }

    #[test]
    fn rename_does_not_clobber_a_file_that_appeared_late() {
        let fx = Fixture::new();
        let path = fx.path("late.bin");
        let dest = Destination::new(&path, "output", SCRATCH_OUTPUT_SUFFIX, Overwrite::ScratchOnly);
        dest.require_writable().unwrap();

        // Another process creates the file between the check and the rename.
        fs::write(&path, b"theirs").unwrap();
        assert!(matches!(
            write_atomic(&dest, b"ours"),
            Err(IoError::AlreadyExists { role: "output", .. })
        ));
        assert_eq!(fs::read(&path).unwrap(), b"theirs");
        // The staged file is cleaned up.
        assert_eq!(fs::read_dir(fx.dir.path()).unwrap().count(), 1);

        let forced = Destination::new(&path, "output", SCRATCH_OUTPUT_SUFFIX, Overwrite::Always);
        write_atomic(&forced, b"ours").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"ours");
    }

    #[cfg(feature = "file-io")]
    #[test]
    fn sha256_checksums_agree() {
        let fx = Fixture::new();
        let new = fx.file("new", b"target for checksum test");
        let old = fx.file("old", b"source for checksum test");
        let patch = fx.path("p");
        let out = fx.path("o");
        let opts = PatchOptions::default();

        let cs = create_patch_file(&new, &old, &patch, &opts).unwrap();
        let applied = apply_patch_file(&patch, &old, &out, &opts).unwrap();
        assert!(cs.new_sha256.is_some());
        assert_eq!(cs.new_sha256, applied.output_sha256);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn compressed_patch_file() {
        let fx = Fixture::new();
        let old_data: Vec<u8> = (0..=255u8).cycle().take(1 << 16).collect();
        let mut new_data = old_data.clone();
        for i in (0..new_data.len()).step_by(4096) {
            new_data[i] = new_data[i].wrapping_add(1);
        }
        let new = fx.file("new", &new_data);
        let old = fx.file("old", &old_data);
        let patch = fx.path("p.zst");
        let out = fx.path("o");
        let opts = PatchOptions::with_compression(
            crate::compress::Compression::from_name("zstd").unwrap(),
        );

        let cs = create_patch_file(&new, &old, &patch, &opts).unwrap();
        assert!(cs.patch_size < cs.serialized_size);
        apply_patch_file(&patch, &old, &out, &opts).unwrap();
        assert_eq!(fs::read(&out).unwrap(), new_data);
    }
}
