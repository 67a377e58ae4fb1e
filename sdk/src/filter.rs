use {
    glob::{MatchOptions, Pattern},
    std::path::{Path, PathBuf},
    tartarus_protocol::RelativePath,
    tracing::warn,
};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    // `*` and `?` never match `/`, so `logs/*` only admits direct children of `logs`.
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Decides which regular files are included in an archive.
///
/// A path is admitted if the pattern list is empty, or if any pattern matches
/// either its base name or the whole relative path.
///
/// Files listed with [`excluding`](PathFilter::excluding) are never archived,
/// whatever the patterns say.
#[derive(Debug, Clone)]
pub struct PathFilter {
    patterns: Vec<Pattern>,
    admit_all: bool,
    excluded: Vec<PathBuf>,
}

impl PathFilter {
    /// Builds a filter from shell glob patterns.
    ///
    /// Malformed patterns never match anything.
    pub fn new<I>(patterns: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut admit_all = true;
        let patterns = patterns
            .into_iter()
            .inspect(|_| admit_all = false)
            .filter_map(|pattern| {
                let pattern = pattern.as_ref();
                Pattern::new(pattern)
                    .inspect_err(|err| warn!(pattern, %err, "ignoring malformed filter pattern"))
                    .ok()
            })
            .collect();
        Self {
            patterns,
            admit_all,
            excluded: Vec::new(),
        }
    }

    /// Filter that admits everything.
    #[must_use]
    pub fn all() -> Self {
        Self {
            patterns: Vec::new(),
            admit_all: true,
            excluded: Vec::new(),
        }
    }

    /// Never archives the file at `path`.
    ///
    /// Used for the archive's own output when it's written inside the tree
    /// being archived.
    #[must_use]
    pub fn excluding(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    pub(crate) fn excluded(&self) -> impl Iterator<Item = &Path> {
        self.excluded.iter().map(PathBuf::as_path)
    }

    #[must_use]
    pub fn matches(&self, path: &RelativePath) -> bool {
        self.admit_all
            || self.patterns.iter().any(|pattern| {
                pattern.matches_with(path.file_name(), MATCH_OPTIONS)
                    || pattern.matches_with(path.as_str(), MATCH_OPTIONS)
            })
    }
}
