use std::io;

/// Failure of any pipeline stage.
///
/// Every stage aborts the whole operation on the first error, so whatever was
/// written to the sink (or extracted to disk) up to that point must be
/// discarded by the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Path not found, permission denied, disk full and other I/O failures.
    #[error(transparent)]
    Filesystem(io::Error),
    /// The input ended early or is not in the expected format.
    #[error("malformed stream: {0}")]
    MalformedStream(String),
    /// The integrity tag of an encrypted frame doesn't match its ciphertext.
    ///
    /// No plaintext is ever released when this is returned.
    #[error("authentication failed: integrity tag mismatch")]
    AuthenticationFailure,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedStream(message.into())
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Classifies an error raised while decoding a byte stream.
    ///
    /// Decoders report corrupt input with a variety of error kinds, so
    /// anything that isn't clearly an OS-level failure counts as malformed input.
    #[must_use]
    pub fn from_stream(err: io::Error) -> Self {
        match err.downcast::<Self>() {
            Ok(err) => err,
            Err(err) => match err.kind() {
                io::ErrorKind::UnexpectedEof
                | io::ErrorKind::InvalidData
                | io::ErrorKind::InvalidInput
                | io::ErrorKind::Other => Self::MalformedStream(err.to_string()),
                _ => Self::Filesystem(err),
            },
        }
    }

    #[must_use]
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailure)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        // Stages report through `io::Write`/`io::Read`, so errors of inner
        // stages arrive wrapped in `io::Error`.
        match err.downcast::<Self>() {
            Ok(err) => err,
            Err(err) => match err.kind() {
                io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
                    Self::MalformedStream(err.to_string())
                }
                _ => Self::Filesystem(err),
            },
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Filesystem(err) => err,
            other => io::Error::other(other),
        }
    }
}
