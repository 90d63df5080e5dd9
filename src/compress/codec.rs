// Built-in compression backends.
//
//   - NoCompression  passthrough
//   - DeflateBackend zlib stream via flate2 (feature `deflate`)
//   - GzipBackend    gzip member via flate2 (feature `deflate`)
//   - LzmaBackend    LZMA via lzma-rs (feature `lzma`)
//   - ZstdBackend    Zstandard frame via zstd (feature `zstd`)
//   - BrotliBackend  Brotli stream via brotli (feature `brotli`)

use std::io::{self, Read, Write};

use super::CompressBackend;

/// Counts bytes passed through to the wrapped writer.
struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Passthrough
// ---------------------------------------------------------------------------

/// Copies the stream unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl CompressBackend for NoCompression {
    fn name(&self) -> &'static str {
        "none"
    }

    fn file_extension(&self) -> &'static str {
        ""
    }

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        io::copy(src, dst)
    }

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        io::copy(src, dst)
    }
}

// ---------------------------------------------------------------------------
// Deflate / gzip
// ---------------------------------------------------------------------------

#[cfg(feature = "deflate")]
fn flate_level(level: u32) -> flate2::Compression {
    flate2::Compression::new(level.min(9))
}

/// zlib-framed deflate.
///
/// Uses zlib format (deflate + zlib header), not raw deflate, so the stream
/// is self-describing and carries an Adler-32 checksum.
#[cfg(feature = "deflate")]
#[derive(Debug, Clone, Copy)]
pub struct DeflateBackend {
    level: flate2::Compression,
}

#[cfg(feature = "deflate")]
impl DeflateBackend {
    /// Create a backend with the given level (0-9, clamped).
    pub fn new(level: u32) -> Self {
        Self {
            level: flate_level(level),
        }
    }
}

#[cfg(feature = "deflate")]
impl Default for DeflateBackend {
    fn default() -> Self {
        Self::new(super::DEFAULT_DEFLATE_LEVEL)
    }
}

#[cfg(feature = "deflate")]
impl CompressBackend for DeflateBackend {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn file_extension(&self) -> &'static str {
        ".deflate"
    }

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        let mut encoder = flate2::write::ZlibEncoder::new(CountingWriter::new(dst), self.level);
        io::copy(src, &mut encoder)?;
        Ok(encoder.finish()?.count)
    }

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        let mut decoder = flate2::read::ZlibDecoder::new(src);
        io::copy(&mut decoder, dst)
    }
}

/// gzip-framed deflate.
#[cfg(feature = "deflate")]
#[derive(Debug, Clone, Copy)]
pub struct GzipBackend {
    level: flate2::Compression,
}

#[cfg(feature = "deflate")]
impl GzipBackend {
    pub fn new(level: u32) -> Self {
        Self {
            level: flate_level(level),
        }
    }
}

#[cfg(feature = "deflate")]
impl Default for GzipBackend {
    fn default() -> Self {
        Self::new(super::DEFAULT_DEFLATE_LEVEL)
    }
}

#[cfg(feature = "deflate")]
impl CompressBackend for GzipBackend {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn file_extension(&self) -> &'static str {
        ".gz"
    }

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        let mut encoder = flate2::write::GzEncoder::new(CountingWriter::new(dst), self.level);
        io::copy(src, &mut encoder)?;
        Ok(encoder.finish()?.count)
    }

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        let mut decoder = flate2::read::GzDecoder::new(src);
        io::copy(&mut decoder, dst)
    }
}

// ---------------------------------------------------------------------------
// LZMA
// ---------------------------------------------------------------------------

/// LZMA-alone stream.
#[cfg(feature = "lzma")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LzmaBackend;

#[cfg(feature = "lzma")]
impl CompressBackend for LzmaBackend {
    fn name(&self) -> &'static str {
        "lzma"
    }

    fn file_extension(&self) -> &'static str {
        ".lzma"
    }

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        let mut input = io::BufReader::new(src);
        let mut output = CountingWriter::new(dst);
        lzma_rs::lzma_compress(&mut input, &mut output)?;
        Ok(output.count)
    }

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        let mut input = io::BufReader::new(src);
        let mut output = CountingWriter::new(dst);
        lzma_rs::lzma_decompress(&mut input, &mut output).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("LZMA decompression failed: {e}"),
            )
        })?;
        Ok(output.count)
    }
}

// ---------------------------------------------------------------------------
// Zstandard
// ---------------------------------------------------------------------------

/// Zstandard frame.
#[cfg(feature = "zstd")]
#[derive(Debug, Clone, Copy)]
pub struct ZstdBackend {
    level: i32,
}

#[cfg(feature = "zstd")]
impl ZstdBackend {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

#[cfg(feature = "zstd")]
impl Default for ZstdBackend {
    fn default() -> Self {
        Self::new(super::DEFAULT_ZSTD_LEVEL)
    }
}

#[cfg(feature = "zstd")]
impl CompressBackend for ZstdBackend {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn file_extension(&self) -> &'static str {
        ".zst"
    }

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        let mut output = CountingWriter::new(dst);
        zstd::stream::copy_encode(src, &mut output, self.level)?;
        Ok(output.count)
    }

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        let mut output = CountingWriter::new(dst);
        zstd::stream::copy_decode(src, &mut output)?;
        Ok(output.count)
    }
}

// ---------------------------------------------------------------------------
// Brotli
// ---------------------------------------------------------------------------

/// Brotli stream.
#[cfg(feature = "brotli")]
#[derive(Debug, Clone, Copy)]
pub struct BrotliBackend {
    quality: i32,
}

#[cfg(feature = "brotli")]
impl BrotliBackend {
    /// Window size exponent (4 MiB), brotli's own default.
    const LGWIN: i32 = 22;

    /// Create a backend with the given quality (0-11, clamped).
    pub fn new(quality: u32) -> Self {
        Self {
            quality: quality.min(11) as i32,
        }
    }
}

#[cfg(feature = "brotli")]
impl Default for BrotliBackend {
    fn default() -> Self {
        Self::new(super::DEFAULT_BROTLI_QUALITY)
    }
}

#[cfg(feature = "brotli")]
impl CompressBackend for BrotliBackend {
    fn name(&self) -> &'static str {
        "brotli"
    }

    fn file_extension(&self) -> &'static str {
        ".br"
    }

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        let params = brotli::enc::BrotliEncoderParams {
            quality: self.quality,
            lgwin: Self::LGWIN,
            ..Default::default()
        };
        let mut input = src;
        let mut output = CountingWriter::new(dst);
        brotli::BrotliCompress(&mut input, &mut output, &params)?;
        Ok(output.count)
    }

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> io::Result<u64> {
        let mut input = src;
        let mut output = CountingWriter::new(dst);
        brotli::BrotliDecompress(&mut input, &mut output)?;
        Ok(output.count)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
