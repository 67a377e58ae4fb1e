use {
    crate::{
        FinishWrite,
        archive::{ArchiveSummary, ExtractSummary, archive, extract},
        compression::{CompressingWriter, CompressionLevel, DecompressingReader},
        crypto::{DecryptingReader, EncryptingWriter},
        filter::PathFilter,
    },
    std::{
        io::{Read, Write},
        path::Path,
    },
    tartarus_protocol::{Passphrase, Result},
    tracing::{info, instrument},
};

/// Archives, compresses and encrypts the tree under `root` into `sink` in one pass.
///
/// `level` is validated before anything is written to `sink`. On success,
/// `sink` holds a complete encrypted frame and is returned; on failure its
/// content must be discarded.
#[instrument(skip_all, fields(root = %root.display(), level = level))]
pub fn archive_compress_encrypt<W: Write>(
    root: &Path,
    sink: W,
    level: i32,
    passphrase: &Passphrase,
    filter: &PathFilter,
) -> Result<(W, ArchiveSummary)> {
    let level = CompressionLevel::try_from(level)?;
    let encryptor = EncryptingWriter::new(sink, passphrase)?;
    let compressor = CompressingWriter::with_level(encryptor, level);
    let (compressor, summary) = archive(root, compressor, filter)?;
    // The compressor's final block must reach the encryptor before the tag is computed.
    let encryptor = compressor.finish()?;
    let sink = encryptor.finish()?;
    info!(files = summary.files, bytes = summary.bytes, "encrypted archive written");
    Ok((sink, summary))
}

/// Verifies and decrypts the frame in `source`, then decompresses and
/// extracts it under `destination`.
///
/// Nothing is written to `destination` unless the integrity tag matches.
#[instrument(skip_all, fields(destination = %destination.display()))]
pub fn decrypt_decompress_extract(
    source: impl Read,
    destination: &Path,
    passphrase: &Passphrase,
) -> Result<ExtractSummary> {
    let decryptor = DecryptingReader::new(source, passphrase)?;
    let decompressor = DecompressingReader::new(decryptor);
    let summary = extract(decompressor, destination)?;
    info!(files = summary.files, bytes = summary.bytes, "encrypted archive restored");
    Ok(summary)
}
