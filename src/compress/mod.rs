// Whole-patch compression.
//
// A serialized patch may be wrapped in a general-purpose compressed stream
// before it is persisted. The stream is opaque to the patch codec: it is
// applied to the full blob on create and removed in full before decode.
//
// - `codec` built-in backends (zlib/deflate, gzip, LZMA, Zstd, Brotli, passthrough)
//
// Callers plug in their own codec by implementing `CompressBackend` and
// passing it as `Compression::Custom`.

pub mod codec;

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::error::PatchError;

pub use codec::NoCompression;
#[cfg(feature = "deflate")]
pub use codec::{DeflateBackend, GzipBackend};
#[cfg(feature = "lzma")]
pub use codec::LzmaBackend;
#[cfg(feature = "zstd")]
pub use codec::ZstdBackend;
#[cfg(feature = "brotli")]
pub use codec::BrotliBackend;

/// Default flate2 level for the deflate and gzip backends.
pub const DEFAULT_DEFLATE_LEVEL: u32 = 6;
/// Default zstd level.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;
/// Default brotli quality.
pub const DEFAULT_BROTLI_QUALITY: u32 = 11;

// ---------------------------------------------------------------------------
// CompressBackend trait
// ---------------------------------------------------------------------------

/// A stream-to-stream compressor for serialized patches.
///
/// Both directions read `src` to the end and return the number of bytes
/// written to `dst`.
///
/// # Implementing a custom backend
///
/// ```no_run
/// use std::io::{self, Read, Write};
/// use sdiff::compress::CompressBackend;
///
/// struct Identity;
///
/// impl CompressBackend for Identity {
///     fn name(&self) -> &'static str { "identity" }
///     fn file_extension(&self) -> &'static str { "" }
///     fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
///         io::copy(src, dst)
///     }
///     fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
///         io::copy(src, dst)
///     }
/// }
/// ```
pub trait CompressBackend: Send + Sync {
    /// Short lowercase identifier, as accepted by [`Compression::from_name`].
    fn name(&self) -> &'static str;

    /// Conventional file extension including the dot, or `""`.
    fn file_extension(&self) -> &'static str;

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64>;

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64>;
}

/// Compress an in-memory buffer.
pub fn compress_bytes(backend: &dyn CompressBackend, data: &[u8]) -> io::Result<Vec<u8>> {
    let mut src = data;
    let mut out = Vec::new();
    backend.compress(&mut src, &mut out)?;
    Ok(out)
}

/// Decompress an in-memory buffer.
pub fn decompress_bytes(backend: &dyn CompressBackend, data: &[u8]) -> io::Result<Vec<u8>> {
    let mut src = data;
    let mut out = Vec::new();
    backend.decompress(&mut src, &mut out)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// The compression applied to a serialized patch.
#[derive(Clone, Default)]
pub enum Compression {
    /// Store the patch as-is.
    #[default]
    None,
    /// zlib stream (deflate with zlib header and checksum).
    #[cfg(feature = "deflate")]
    Deflate {
        /// 0-9; larger values are clamped.
        level: u32,
    },
    /// gzip member.
    #[cfg(feature = "deflate")]
    Gzip { level: u32 },
    /// Raw LZMA stream.
    #[cfg(feature = "lzma")]
    Lzma,
    /// Zstandard frame.
    #[cfg(feature = "zstd")]
    Zstd { level: i32 },
    /// Brotli stream.
    #[cfg(feature = "brotli")]
    Brotli {
        /// 0-11; larger values are clamped.
        quality: u32,
    },
    /// A backend supplied by the caller.
    Custom(Arc<dyn CompressBackend>),
}

impl fmt::Debug for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            #[cfg(feature = "deflate")]
            Self::Deflate { level } => write!(f, "Deflate {{ level: {level} }}"),
            #[cfg(feature = "deflate")]
            Self::Gzip { level } => write!(f, "Gzip {{ level: {level} }}"),
            #[cfg(feature = "lzma")]
            Self::Lzma => write!(f, "Lzma"),
            #[cfg(feature = "zstd")]
            Self::Zstd { level } => write!(f, "Zstd {{ level: {level} }}"),
            #[cfg(feature = "brotli")]
            Self::Brotli { quality } => write!(f, "Brotli {{ quality: {quality} }}"),
            Self::Custom(b) => write!(f, "Custom({})", b.name()),
        }
    }
}

impl Compression {
    /// Return the backend implementation, or `None` when the patch is stored
    /// uncompressed.
    pub fn backend(&self) -> Option<Box<dyn CompressBackend>> {
        match self {
            Self::None => None,
            #[cfg(feature = "deflate")]
            Self::Deflate { level } => Some(Box::new(DeflateBackend::new(*level))),
            #[cfg(feature = "deflate")]
            Self::Gzip { level } => Some(Box::new(GzipBackend::new(*level))),
            #[cfg(feature = "lzma")]
            Self::Lzma => Some(Box::new(LzmaBackend)),
            #[cfg(feature = "zstd")]
            Self::Zstd { level } => Some(Box::new(ZstdBackend::new(*level))),
            #[cfg(feature = "brotli")]
            Self::Brotli { quality } => Some(Box::new(BrotliBackend::new(*quality))),
            Self::Custom(b) => Some(Box::new(ArcBackend(b.clone()))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Name of the selected backend, `"none"` when disabled.
    pub fn name(&self) -> &'static str {
        self.backend().map_or("none", |b| b.name())
    }

    /// Look up a built-in backend by name with its default level.
    ///
    /// Accepts `none`, `deflate` (alias `zlib`), `gzip` (alias `gz`), `lzma`,
    /// `zstd` (alias `zst`) and `brotli` (alias `br`). Names whose backend is
    /// compiled out are rejected like unknown names.
    pub fn from_name(name: &str) -> Result<Self, PatchError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            #[cfg(feature = "deflate")]
            "deflate" | "zlib" => Ok(Self::Deflate {
                level: DEFAULT_DEFLATE_LEVEL,
            }),
            #[cfg(feature = "deflate")]
            "gzip" | "gz" => Ok(Self::Gzip {
                level: DEFAULT_DEFLATE_LEVEL,
            }),
            #[cfg(feature = "lzma")]
            "lzma" => Ok(Self::Lzma),
            #[cfg(feature = "zstd")]
            "zstd" | "zst" => Ok(Self::Zstd {
                level: DEFAULT_ZSTD_LEVEL,
            }),
            #[cfg(feature = "brotli")]
            "brotli" | "br" => Ok(Self::Brotli {
                quality: DEFAULT_BROTLI_QUALITY,
            }),
            other => Err(PatchError::InvalidOptions(format!(
                "unknown or disabled compression backend '{other}' (available: {})",
                available_names().join(", ")
            ))),
        }
    }
}

/// Names of the built-in backends compiled into this build.
pub fn available_names() -> Vec<&'static str> {
    let mut names = vec!["none"];
    if cfg!(feature = "deflate") {
        names.extend(["deflate", "gzip"]);
    }
    if cfg!(feature = "lzma") {
        names.push("lzma");
    }
    if cfg!(feature = "zstd") {
        names.push("zstd");
    }
    if cfg!(feature = "brotli") {
        names.push("brotli");
    }
    names
}

/// Wrapper to make `Arc<dyn CompressBackend>` implement `CompressBackend`.
struct ArcBackend(Arc<dyn CompressBackend>);

impl CompressBackend for ArcBackend {
    fn name(&self) -> &'static str {
        self.0.name()
    }
    fn file_extension(&self) -> &'static str {
        self.0.file_extension()
    }
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        self.0.compress(src, dst)
    }
    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        self.0.decompress(src, dst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
