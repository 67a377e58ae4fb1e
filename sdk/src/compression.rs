//! Raw deflate streams (no zlib or gzip framing).

use {
    crate::FinishWrite,
    flate2::{Compression, read::DeflateDecoder, write::DeflateEncoder},
    std::io::{self, Read, Write},
    tartarus_protocol::{Error, Result},
};

/// Deflate compression effort.
///
/// `-1` selects the library default (equivalent to 6), `0` stores blocks
/// without compression, and `1..=9` trade speed for size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(Compression);

impl CompressionLevel {
    pub const DEFAULT: Self = Self(Compression::new(6));

    #[must_use]
    pub fn level(self) -> u32 {
        self.0.level()
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i32> for CompressionLevel {
    type Error = Error;

    fn try_from(level: i32) -> Result<Self> {
        match level {
            -1 => Ok(Self::DEFAULT),
            0..=9 => {
                let level = u32::try_from(level).map_err(|err| {
                    Error::invalid_parameter(format!("invalid compression level {level}: {err}"))
                })?;
                Ok(Self(Compression::new(level)))
            }
            _ => Err(Error::invalid_parameter(format!(
                "compression level must be -1 or in 0..=9, got {level}"
            ))),
        }
    }
}

/// Compresses everything written to it.
///
/// [`finish`](FinishWrite::finish) writes the final block; without it the
/// output can't be decompressed.
pub struct CompressingWriter<W: Write> {
    inner: DeflateEncoder<W>,
}

impl<W: Write> CompressingWriter<W> {
    /// Validates `level` before anything is written to `sink`.
    pub fn new(sink: W, level: i32) -> Result<Self> {
        Ok(Self::with_level(sink, level.try_into()?))
    }

    pub fn with_level(sink: W, level: CompressionLevel) -> Self {
        Self {
            inner: DeflateEncoder::new(sink, level.0),
        }
    }
}

impl<W: Write> Write for CompressingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> FinishWrite for CompressingWriter<W> {
    type Inner = W;

    fn finish(self) -> Result<W> {
        Ok(self.inner.finish()?)
    }
}

/// Decompresses a deflate stream on demand.
///
/// Corrupt input is reported as [`Error::MalformedStream`]. Once the final
/// block has been read, further reads return 0.
pub struct DecompressingReader<R: Read> {
    inner: DeflateDecoder<R>,
}

impl<R: Read> DecompressingReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            inner: DeflateDecoder::new(source),
        }
    }
}

impl<R: Read> Read for DecompressingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner
            .read(buf)
            .map_err(|err| Error::from_stream(err).into())
    }
}
