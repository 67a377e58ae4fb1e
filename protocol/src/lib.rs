//! Vocabulary shared by every stage of the tartarus pipeline: the error type,
//! archive-relative paths, passphrases, and the byte layouts of the encrypted
//! frame and the combined flat-file envelope.

mod credentials;
pub mod envelope;
mod error;
mod path;
pub mod util;

pub use crate::{
    credentials::Passphrase,
    envelope::EnvelopeHeader,
    error::{Error, Result},
    path::RelativePath,
};

/// Length of the random nonce at the start of an encrypted frame.
pub const NONCE_LEN: usize = 16;
/// Length of the HMAC-SHA256 tag at the end of an encrypted frame.
pub const TAG_LEN: usize = 32;
/// Length of the AES-128 key.
pub const KEY_LEN: usize = 16;

/// Kind of an entry stored in a tar archive.
///
/// Symlinks, devices and other special files are never archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}
