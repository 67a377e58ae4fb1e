//! Framing of the combined flat-file archive.
//!
//! Each file is preceded by a header made of two text lines, the relative path
//! and the decimal byte count, followed by exactly that many raw bytes:
//!
//! ```text
//! docs/readme.txt\n
//! 11\n
//! hello world
//! ```
//!
//! The decoder never needs to seek or pre-scan: it reads a header, copies the
//! payload, and repeats until the stream ends.

use {
    crate::{Error, RelativePath, Result},
    std::io::{BufRead, Write},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub path: RelativePath,
    pub size: u64,
}

impl EnvelopeHeader {
    pub fn write_to(&self, mut output: impl Write) -> Result<()> {
        if self.path.as_str().contains('\n') {
            return Err(Error::invalid_parameter(format!(
                "path {:?} cannot be stored in an envelope",
                self.path.as_str()
            )));
        }
        write!(output, "{}\n{}\n", self.path, self.size)?;
        Ok(())
    }

    /// Reads the next header.
    ///
    /// Returns `None` if the stream ends before the first byte of a header.
    pub fn read_from(input: &mut impl BufRead) -> Result<Option<Self>> {
        let mut path_line = String::new();
        if input.read_line(&mut path_line).map_err(Error::from_stream)? == 0 {
            return Ok(None);
        }
        let path = line_content(&path_line)
            .ok_or_else(|| Error::malformed("stream ended inside an envelope header"))?;
        let path = RelativePath::parse(path)?;

        let mut size_line = String::new();
        input.read_line(&mut size_line).map_err(Error::from_stream)?;
        let size = line_content(&size_line).ok_or_else(|| {
            Error::malformed(format!("expected size after file name {path}"))
        })?;
        let size = size
            .trim()
            .parse()
            .map_err(|err| Error::malformed(format!("invalid size {size:?} for file {path}: {err}")))?;
        Ok(Some(Self { path, size }))
    }
}

/// Returns a complete line without its `\n` or `\r\n` terminator, or `None`
/// if the line wasn't terminated.
fn line_content(line: &str) -> Option<&str> {
    let line = line.strip_suffix('\n')?;
    Some(line.strip_suffix('\r').unwrap_or(line))
}
