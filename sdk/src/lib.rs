//! Streaming data-protection pipeline.
//!
//! A directory tree is serialized as a tar stream ([`archive`]), compressed
//! with raw deflate ([`compression`]) and encrypted with AES-128-CTR plus an
//! HMAC-SHA256 tag ([`crypto`]). Every stage is a [`Write`] transform on the
//! archiving side and a [`Read`] transform on the extraction side, so the
//! stages nest without materializing the payload. [`pipeline`] composes them.
//!
//! [`Read`]: std::io::Read

pub mod archive;
pub mod compression;
pub mod crypto;
pub mod filter;
pub mod flat;
pub mod pipeline;

pub use {
    archive::{ArchiveSummary, ExtractSummary, archive, extract},
    compression::{CompressingWriter, CompressionLevel, DecompressingReader},
    crypto::{DecryptingReader, EncryptingWriter},
    filter::PathFilter,
    pipeline::{archive_compress_encrypt, decrypt_decompress_extract},
    tartarus_protocol::{Error, Passphrase, Result},
};

use std::io::Write;

/// Byte sink that must be finalized explicitly.
///
/// Dropping the writer without calling [`finish`](FinishWrite::finish) leaves
/// the output truncated. Nested sinks must be finished innermost first: the
/// outer writer is only returned once the inner one has flushed its trailer.
pub trait FinishWrite: Write {
    type Inner;

    fn finish(self) -> Result<Self::Inner>;
}
