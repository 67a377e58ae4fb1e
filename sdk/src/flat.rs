//! Directory compression without tar.
//!
//! The separate layout stores every file as its own deflate stream with a
//! `.deflate` suffix, mirroring the source tree. The combined layout stores a
//! single deflate stream containing an [`EnvelopeHeader`] and the raw content
//! of every file.

use {
    crate::{
        FinishWrite,
        archive::ExactReader,
        compression::{CompressingWriter, CompressionLevel, DecompressingReader},
    },
    fs_err::{File, create_dir_all},
    std::{
        io::{self, BufReader, Read},
        path::{Path, PathBuf},
    },
    tartarus_protocol::{EnvelopeHeader, Error, RelativePath, Result},
    tempfile::NamedTempFile,
    tracing::{debug, info, instrument},
    walkdir::WalkDir,
};

const SEPARATE_SUFFIX: &str = ".deflate";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlatSummary {
    pub files: u64,
    /// Total uncompressed size of all files.
    pub original_bytes: u64,
}

impl FlatSummary {
    pub fn report(&self) {
        info!("processed {} files ({} bytes)", self.files, self.original_bytes);
    }
}

/// Regular files under `root` in lexical depth-first order.
fn regular_files(root: &Path) -> impl Iterator<Item = Result<(PathBuf, RelativePath)>> + '_ {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(
                RelativePath::from_native(root, entry.path())
                    .map(|relative| (entry.into_path(), relative)),
            ),
            Ok(_) => None,
            Err(err) => Some(Err(io::Error::from(err).into())),
        })
}

/// Compresses every file under `source` to `destination/<path>.deflate`.
#[instrument(skip_all, fields(source = %source.display(), destination = %destination.display()))]
pub fn compress_separate(source: &Path, destination: &Path, level: i32) -> Result<FlatSummary> {
    let level = CompressionLevel::try_from(level)?;
    let mut summary = FlatSummary::default();
    for item in regular_files(source) {
        let (path, relative) = item?;
        let target =
            destination.join(format!("{}{SEPARATE_SUFFIX}", relative.to_native().display()));
        if let Some(parent) = target.parent() {
            create_dir_all(parent)?;
        }
        let mut input = File::open(&path)?;
        let mut writer = CompressingWriter::with_level(File::create(&target)?, level);
        let original = io::copy(&mut input, &mut writer)?;
        let compressed = writer.finish()?.metadata()?.len();
        info!(
            "{} -> {} [{original}/{compressed} bytes]",
            path.display(),
            target.display()
        );
        summary.files += 1;
        summary.original_bytes += original;
    }
    Ok(summary)
}

/// Decompresses every `*.deflate` file under `source` into `destination`,
/// dropping the suffix. Other files are ignored.
#[instrument(skip_all, fields(source = %source.display(), destination = %destination.display()))]
pub fn decompress_separate(source: &Path, destination: &Path) -> Result<FlatSummary> {
    create_dir_all(destination)?;
    let mut summary = FlatSummary::default();
    for item in regular_files(source) {
        let (path, relative) = item?;
        let Some(name) = relative
            .as_str()
            .strip_suffix(SEPARATE_SUFFIX)
            .filter(|name| !name.is_empty() && !name.ends_with('/'))
        else {
            debug!(path = %relative, "ignoring file without {SEPARATE_SUFFIX} suffix");
            continue;
        };
        let target = RelativePath::parse(name)?.under(destination);
        if let Some(parent) = target.parent() {
            create_dir_all(parent)?;
        }
        let mut reader = DecompressingReader::new(File::open(&path)?);
        let original = io::copy(&mut reader, &mut File::create(&target)?)?;
        info!("{} -> {} [{original} bytes]", path.display(), target.display());
        summary.files += 1;
        summary.original_bytes += original;
    }
    Ok(summary)
}

/// Compresses every file under `source` into a single combined file.
///
/// `destination` is only replaced once the whole stream has been written.
#[instrument(skip_all, fields(source = %source.display(), destination = %destination.display()))]
pub fn compress_combined(source: &Path, destination: &Path, level: i32) -> Result<FlatSummary> {
    let level = CompressionLevel::try_from(level)?;
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    // Listed before the temporary output exists, so it can't include itself.
    let files = regular_files(source).collect::<Result<Vec<_>>>()?;
    create_dir_all(parent)?;
    let mut writer = CompressingWriter::with_level(NamedTempFile::new_in(parent)?, level);
    let mut summary = FlatSummary::default();
    for (path, relative) in files {
        let mut file = File::open(&path)?;
        let size = file.metadata()?.len();
        EnvelopeHeader {
            path: relative,
            size,
        }
        .write_to(&mut writer)?;
        let mut content = ExactReader::new(&mut file, &path, size);
        io::copy(&mut content, &mut writer)?;
        content.finish()?;
        debug!(path = %path.display(), size, "added file");
        summary.files += 1;
        summary.original_bytes += size;
    }
    let temp_file = writer.finish()?;
    temp_file.persist(destination).map_err(io::Error::from)?;
    Ok(summary)
}

/// Recreates the files stored in the combined file `source` under `destination`.
#[instrument(skip_all, fields(source = %source.display(), destination = %destination.display()))]
pub fn decompress_combined(source: &Path, destination: &Path) -> Result<FlatSummary> {
    create_dir_all(destination)?;
    let mut reader = BufReader::new(DecompressingReader::new(File::open(source)?));
    let mut summary = FlatSummary::default();
    while let Some(header) = EnvelopeHeader::read_from(&mut reader)? {
        let target = header.path.under(destination);
        if let Some(parent) = target.parent() {
            create_dir_all(parent)?;
        }
        let mut file = File::create(&target)?;
        let copied = io::copy(&mut (&mut reader).take(header.size), &mut file)?;
        if copied != header.size {
            return Err(Error::malformed(format!(
                "content of {} is truncated ({copied} of {} bytes)",
                header.path, header.size
            )));
        }
        debug!(path = %header.path, size = copied, "extracted file");
        summary.files += 1;
        summary.original_bytes += copied;
    }
    Ok(summary)
}
