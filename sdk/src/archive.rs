//! Tar serialization of a directory tree.
//!
//! Entries are emitted in lexical depth-first order. Names are relative to the
//! root (which itself is never emitted) and `/`-separated; directory names end
//! with `/`. The filter only applies to regular files: every directory is
//! archived, even if all of its files are filtered out, so extraction
//! recreates it empty.

use {
    crate::filter::PathFilter,
    fs_err::{File, create_dir_all},
    std::{
        io::{self, Read, Take, Write},
        path::{Path, PathBuf},
        str,
    },
    tar::{Archive, Builder, EntryType, Header, HeaderMode},
    tartarus_protocol::{EntryKind, Error, RelativePath, Result},
    tracing::{debug, info, instrument, warn},
    walkdir::WalkDir,
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub directories: u64,
    pub files: u64,
    /// Regular files rejected by the filter.
    pub skipped_files: u64,
    /// Symlinks, sockets, devices and other entries that are never archived.
    pub skipped_special: u64,
    /// Total content size of archived files.
    pub bytes: u64,
}

impl ArchiveSummary {
    pub fn report(&self) {
        info!(
            "archived {} directories and {} files ({} bytes)",
            self.directories, self.files, self.bytes
        );
        if self.skipped_files > 0 {
            info!("skipped {} files not matching the filter", self.skipped_files);
        }
        if self.skipped_special > 0 {
            info!("skipped {} special files", self.skipped_special);
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub directories: u64,
    pub files: u64,
    /// Entries of types other than regular file and directory.
    pub skipped_entries: u64,
    pub bytes: u64,
}

impl ExtractSummary {
    pub fn report(&self) {
        info!(
            "extracted {} directories and {} files ({} bytes)",
            self.directories, self.files, self.bytes
        );
        if self.skipped_entries > 0 {
            info!("skipped {} entries of unsupported types", self.skipped_entries);
        }
    }
}

/// Writes the tree under `root` to `sink` as a tar stream.
///
/// Returns `sink` after the end-of-archive marker has been written.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn archive<W: Write>(root: &Path, sink: W, filter: &PathFilter) -> Result<(W, ArchiveSummary)> {
    if !fs_err::metadata(root)?.is_dir() {
        return Err(Error::invalid_parameter(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    // Excluded files are matched by canonical path.
    let canonical_root = fs_err::canonicalize(root)?;
    let excluded: Vec<PathBuf> = filter
        .excluded()
        .filter_map(|path| fs_err::canonicalize(path).ok())
        .collect();
    let mut builder = Builder::new(sink);
    builder.follow_symlinks(false);
    let mut summary = ArchiveSummary::default();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        let relative = RelativePath::from_native(root, entry.path())?;
        let file_type = entry.file_type();
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            warn!(path = %entry.path().display(), ?file_type, "skipping special file");
            summary.skipped_special += 1;
            continue;
        };

        match kind {
            EntryKind::Directory => {
                let metadata = entry.metadata().map_err(io::Error::from)?;
                let mut header = Header::new_gnu();
                header.set_metadata_in_mode(&metadata, HeaderMode::Complete);
                header.set_entry_type(EntryType::Directory);
                header.set_size(0);
                builder.append_data(&mut header, relative.to_dir_name(), io::empty())?;
                summary.directories += 1;
                debug!(path = %relative, "archived directory");
            }
            EntryKind::File => {
                if excluded.contains(&relative.under(&canonical_root)) {
                    debug!(path = %relative, "skipping excluded file");
                    continue;
                }
                if !filter.matches(&relative) {
                    debug!(path = %relative, "skipping file not matching the filter");
                    summary.skipped_files += 1;
                    continue;
                }
                let size = append_file(&mut builder, entry.path(), &relative)?;
                summary.files += 1;
                summary.bytes += size;
                debug!(path = %relative, size, "archived file");
            }
        }
    }

    let sink = builder.into_inner()?;
    Ok((sink, summary))
}

fn append_file<W: Write>(
    builder: &mut Builder<W>,
    path: &Path,
    relative: &RelativePath,
) -> Result<u64> {
    let mut file = File::open(path)?;
    let metadata = file.metadata()?;
    let size = metadata.len();
    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(&metadata, HeaderMode::Complete);
    header.set_entry_type(EntryType::Regular);
    header.set_size(size);

    // The header is written before the content, so the content must match
    // the declared size exactly.
    let mut content = ExactReader::new(&mut file, path, size);
    builder.append_data(&mut header, relative.as_str(), &mut content)?;
    content.finish()?;
    Ok(size)
}

/// Reads exactly the length a file had when it was opened.
///
/// Fails instead of ending early if the file shrinks while it's being read;
/// [`finish`](ExactReader::finish) fails if it grew.
pub(crate) struct ExactReader<'a> {
    inner: Take<&'a mut File>,
    path: &'a Path,
}

impl<'a> ExactReader<'a> {
    pub(crate) fn new(file: &'a mut File, path: &'a Path, size: u64) -> Self {
        Self {
            inner: file.take(size),
            path,
        }
    }

    pub(crate) fn finish(self) -> Result<()> {
        if self.inner.limit() > 0 || self.inner.into_inner().read(&mut [0u8; 1])? != 0 {
            return Err(size_changed(self.path));
        }
        Ok(())
    }
}

impl Read for ExactReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.inner.read(buf)?;
        if len == 0 && self.inner.limit() > 0 && !buf.is_empty() {
            return Err(size_changed(self.path).into());
        }
        Ok(len)
    }
}

/// Reports read failures of a tar entry as stream errors, leaving write
/// failures of the destination as they are.
struct EntryReader<R>(R);

impl<R: Read> Read for EntryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).map_err(|err| Error::from_stream(err).into())
    }
}

fn size_changed(path: &Path) -> Error {
    Error::Filesystem(io::Error::other(format!(
        "{} changed size while being archived",
        path.display()
    )))
}

/// Recreates the entries of the tar stream `source` under `destination`.
///
/// Existing files are overwritten. Entries other than regular files and
/// directories are skipped.
#[instrument(skip_all, fields(destination = %destination.display()))]
pub fn extract(source: impl Read, destination: &Path) -> Result<ExtractSummary> {
    create_dir_all(destination)?;
    let mut summary = ExtractSummary::default();
    let mut archive = Archive::new(source);
    for entry in archive.entries().map_err(Error::from_stream)? {
        let mut entry = entry.map_err(Error::from_stream)?;
        let entry_type = entry.header().entry_type();
        let kind = if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_file() {
            EntryKind::File
        } else {
            debug!(?entry_type, "skipping entry of unsupported type");
            summary.skipped_entries += 1;
            continue;
        };

        let name_bytes = entry.path_bytes();
        let name = str::from_utf8(&name_bytes)
            .map_err(|err| Error::malformed(format!("entry name is not valid UTF-8: {err}")))?;
        let relative = RelativePath::parse(name)?;
        let target = relative.under(destination);

        match kind {
            EntryKind::Directory => {
                create_dir_all(&target)?;
                summary.directories += 1;
                debug!(path = %relative, "extracted directory");
            }
            EntryKind::File => {
                if let Some(parent) = target.parent() {
                    create_dir_all(parent)?;
                }
                let expected = entry.size();
                let mut file = File::create(&target)?;
                let copied = io::copy(&mut EntryReader(&mut entry), &mut file)?;
                if copied != expected {
                    return Err(Error::malformed(format!(
                        "content of {relative} is truncated ({copied} of {expected} bytes)"
                    )));
                }

                #[cfg(target_family = "unix")]
                {
                    use std::{fs::Permissions, os::unix::fs::PermissionsExt};

                    if let Ok(mode) = entry.header().mode() {
                        file.set_permissions(Permissions::from_mode(mode & 0o7777))?;
                    }
                }

                summary.files += 1;
                summary.bytes += copied;
                debug!(path = %relative, size = copied, "extracted file");
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, clippy::indexing_slicing, reason = "test")]
mod tests {
    use {
        super::*,
        fs_err::{read, write},
        std::io::Cursor,
        tempfile::{NamedTempFile, TempDir},
    };

    fn entry_names(stream: &[u8]) -> Vec<String> {
        let mut archive = Archive::new(Cursor::new(stream));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let entry = entry.unwrap();
                String::from_utf8(entry.path_bytes().into_owned()).unwrap()
            })
            .collect()
    }

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path().join("a.txt"), "alpha").unwrap();
        create_dir_all(dir.path().join("src")).unwrap();
        write(dir.path().join("src").join("main.go"), "package main").unwrap();
        create_dir_all(dir.path().join("logs")).unwrap();
        write(dir.path().join("logs").join("app.log"), "started").unwrap();
        dir
    }

    #[test]
    fn entry_order_and_names() {
        let tree = sample_tree();
        let (stream, summary) = archive(tree.path(), Vec::new(), &PathFilter::all()).unwrap();
        assert_eq!(
            entry_names(&stream),
            ["a.txt", "logs/", "logs/app.log", "src/", "src/main.go"]
        );
        assert_eq!(
            summary,
            ArchiveSummary {
                directories: 2,
                files: 3,
                skipped_files: 0,
                skipped_special: 0,
                bytes: 24,
            }
        );
    }

    #[test]
    fn filter_skips_files_but_keeps_directories() {
        let tree = sample_tree();
        let filter = PathFilter::new(["*.txt"]);
        let (stream, summary) = archive(tree.path(), Vec::new(), &filter).unwrap();
        assert_eq!(entry_names(&stream), ["a.txt", "logs/", "src/"]);
        assert_eq!(summary.skipped_files, 2);

        let out = TempDir::new().unwrap();
        extract(Cursor::new(stream), out.path()).unwrap();
        assert_eq!(read(out.path().join("a.txt")).unwrap(), b"alpha");
        assert!(out.path().join("src").is_dir());
        assert!(!out.path().join("src").join("main.go").exists());
        assert!(out.path().join("logs").is_dir());
    }

    #[test]
    fn full_path_patterns() {
        let tree = sample_tree();
        let filter = PathFilter::new(["logs/*"]);
        let (stream, _) = archive(tree.path(), Vec::new(), &filter).unwrap();
        assert_eq!(entry_names(&stream), ["logs/", "logs/app.log", "src/"]);
    }

    #[test]
    fn empty_tree() {
        let tree = TempDir::new().unwrap();
        let (stream, summary) = archive(tree.path(), Vec::new(), &PathFilter::all()).unwrap();
        assert_eq!(summary, ArchiveSummary::default());
        // End-of-archive marker only.
        assert_eq!(stream.len(), 1024);

        let out = TempDir::new().unwrap();
        let summary = extract(Cursor::new(stream), &out.path().join("restored")).unwrap();
        assert_eq!(summary, ExtractSummary::default());
        assert!(out.path().join("restored").is_dir());
    }

    #[test]
    fn root_must_be_a_directory() {
        let tree = sample_tree();
        let result = archive(&tree.path().join("a.txt"), Vec::new(), &PathFilter::all());
        assert!(matches!(result, Err(Error::InvalidParameter(_))));

        let result = archive(&tree.path().join("missing"), Vec::new(), &PathFilter::all());
        assert!(matches!(result, Err(Error::Filesystem(_))));
    }

    #[test]
    fn long_names() {
        let tree = TempDir::new().unwrap();
        let deep = tree.path().join("d".repeat(80)).join("e".repeat(80));
        create_dir_all(&deep).unwrap();
        write(deep.join(format!("{}.txt", "f".repeat(120))), "deep").unwrap();

        let (stream, _) = archive(tree.path(), Vec::new(), &PathFilter::all()).unwrap();
        let out = TempDir::new().unwrap();
        let summary = extract(Cursor::new(stream), out.path()).unwrap();
        assert_eq!(summary.files, 1);
        let restored = out
            .path()
            .join("d".repeat(80))
            .join("e".repeat(80))
            .join(format!("{}.txt", "f".repeat(120)));
        assert_eq!(read(restored).unwrap(), b"deep");
    }

    #[test]
    fn unsupported_entries_are_skipped() {
        let mut builder = Builder::new(Vec::new());
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Symlink);
        header.set_size(0);
        builder.append_link(&mut header, "link", "a.txt").unwrap();
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(5);
        header.set_mode(0o644);
        builder.append_data(&mut header, "a.txt", &b"alpha"[..]).unwrap();
        let stream = builder.into_inner().unwrap();

        let out = TempDir::new().unwrap();
        let summary = extract(Cursor::new(stream), out.path()).unwrap();
        assert_eq!(summary.skipped_entries, 1);
        assert_eq!(summary.files, 1);
        assert!(!out.path().join("link").exists());
        assert_eq!(read(out.path().join("a.txt")).unwrap(), b"alpha");
    }

    #[test]
    fn path_traversal_is_rejected() {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(4);
        header.set_mode(0o644);
        // `Builder` refuses `..`, so the name is written directly.
        header.as_gnu_mut().unwrap().name[..9].copy_from_slice(b"../escape");
        header.set_cksum();
        let mut stream = header.as_bytes().to_vec();
        stream.extend_from_slice(b"evil");
        stream.resize(512 + 512 + 1024, 0);

        let out = TempDir::new().unwrap();
        let dest = out.path().join("dest");
        let result = extract(Cursor::new(stream), &dest);
        assert!(matches!(result, Err(Error::MalformedStream(_))));
        assert!(!out.path().join("escape").exists());
    }

    #[test]
    fn truncated_content_is_malformed() {
        let tree = sample_tree();
        let (mut stream, _) = archive(tree.path(), Vec::new(), &PathFilter::all()).unwrap();
        // Header of `a.txt` followed by part of its content.
        stream.truncate(512 + 3);
        let out = TempDir::new().unwrap();
        let result = extract(Cursor::new(stream), out.path());
        assert!(matches!(result, Err(Error::MalformedStream(_))));
    }

    #[test]
    fn excluded_files_are_not_archived() {
        let tree = sample_tree();
        // Spelled differently from the walked path.
        let filter = PathFilter::all().excluding(tree.path().join("logs/../src/main.go"));
        let (stream, summary) = archive(tree.path(), Vec::new(), &filter).unwrap();
        assert_eq!(entry_names(&stream), ["a.txt", "logs/", "logs/app.log", "src/"]);
        assert_eq!(summary.files, 2);
    }

    #[test]
    fn output_inside_the_tree_is_not_archived() {
        let tree = sample_tree();
        let output = NamedTempFile::new_in(tree.path()).unwrap();
        let filter = PathFilter::all().excluding(output.path());
        let (_, summary) = archive(tree.path(), output.as_file(), &filter).unwrap();
        assert_eq!(summary.files, 3);

        let out = TempDir::new().unwrap();
        extract(File::open(output.path()).unwrap(), out.path()).unwrap();
        assert_eq!(fs_err::read_dir(out.path()).unwrap().count(), 3);
    }

    #[test]
    fn file_that_shrinks_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        write(&path, "alpha").unwrap();
        let mut file = File::open(&path).unwrap();

        let mut content = ExactReader::new(&mut file, &path, 6);
        let err = content.read_to_end(&mut Vec::new()).unwrap_err();
        assert!(matches!(Error::from(err), Error::Filesystem(_)));
        assert!(matches!(content.finish(), Err(Error::Filesystem(_))));
    }

    #[test]
    fn file_that_grows_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        write(&path, "alpha").unwrap();
        let mut file = File::open(&path).unwrap();

        let mut content = ExactReader::new(&mut file, &path, 4);
        let mut prefix = Vec::new();
        content.read_to_end(&mut prefix).unwrap();
        assert_eq!(prefix, b"alph");
        assert!(matches!(content.finish(), Err(Error::Filesystem(_))));

        let mut file = File::open(&path).unwrap();
        let mut content = ExactReader::new(&mut file, &path, 5);
        content.read_to_end(&mut Vec::new()).unwrap();
        content.finish().unwrap();
    }

    #[test]
    fn extraction_overwrites_existing_files() {
        let tree = sample_tree();
        let (short, _) = archive(tree.path(), Vec::new(), &PathFilter::all()).unwrap();
        write(tree.path().join("a.txt"), "a much longer alpha").unwrap();
        let (long, _) = archive(tree.path(), Vec::new(), &PathFilter::all()).unwrap();

        let out = TempDir::new().unwrap();
        extract(Cursor::new(long), out.path()).unwrap();
        assert_eq!(read(out.path().join("a.txt")).unwrap(), b"a much longer alpha");
        extract(Cursor::new(short), out.path()).unwrap();
        assert_eq!(read(out.path().join("a.txt")).unwrap(), b"alpha");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn destination_write_failure_is_filesystem_error() {
        let tree = sample_tree();
        let (stream, _) = archive(tree.path(), Vec::new(), &PathFilter::all()).unwrap();

        let out = TempDir::new().unwrap();
        // Writes to /dev/full fail with ENOSPC.
        std::os::unix::fs::symlink("/dev/full", out.path().join("a.txt")).unwrap();
        let result = extract(Cursor::new(stream), out.path());
        assert!(matches!(result, Err(Error::Filesystem(_))), "{result:?}");
    }

    #[cfg(target_family = "unix")]
    #[test]
    fn file_mode_is_restored() {
        use std::{fs::Permissions, os::unix::fs::PermissionsExt};

        let tree = sample_tree();
        let script = tree.path().join("run.sh");
        write(&script, "#!/bin/sh\n").unwrap();
        fs_err::set_permissions(&script, Permissions::from_mode(0o750)).unwrap();

        let (stream, _) = archive(tree.path(), Vec::new(), &PathFilter::all()).unwrap();
        let out = TempDir::new().unwrap();
        extract(Cursor::new(stream), out.path()).unwrap();
        let mode = fs_err::metadata(out.path().join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[cfg(target_family = "unix")]
    #[test]
    fn symlinks_are_not_archived() {
        let tree = sample_tree();
        std::os::unix::fs::symlink("a.txt", tree.path().join("link")).unwrap();
        let (stream, summary) = archive(tree.path(), Vec::new(), &PathFilter::all()).unwrap();
        assert_eq!(summary.skipped_special, 1);
        assert!(!entry_names(&stream).contains(&"link".to_owned()));
    }
}
