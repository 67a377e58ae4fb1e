use {
    crate::{Error, Result},
    derive_more::Display,
    std::{
        path::{Component, Path, PathBuf},
        str::FromStr,
    },
};

/// Path of an entry relative to the archive root, always `/`-separated.
///
/// Never empty, never absolute, and contains no `.` or `..` components, so
/// joining it onto a destination directory can't escape that directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub struct RelativePath(String);

impl RelativePath {
    /// Parses an entry name as it appears on the wire.
    ///
    /// Directory names carry a single trailing `/`, which is dropped.
    pub fn parse(name: &str) -> Result<Self> {
        let path = name.strip_suffix('/').unwrap_or(name);
        check_path(path)?;
        Ok(Self(path.to_owned()))
    }

    /// Computes the path of `path` relative to `root`.
    pub fn from_native(root: &Path, path: &Path) -> Result<Self> {
        let relative = path.strip_prefix(root).map_err(|err| {
            Error::invalid_parameter(format!(
                "{} is not inside {}: {err}",
                path.display(),
                root.display()
            ))
        })?;
        let mut parts = Vec::new();
        for component in relative.components() {
            let Component::Normal(part) = component else {
                return Err(Error::invalid_parameter(format!(
                    "unsupported path component in {}",
                    relative.display()
                )));
            };
            let part = part.to_str().ok_or_else(|| {
                Error::invalid_parameter(format!(
                    "unsupported path (not valid unicode): {}",
                    relative.display()
                ))
            })?;
            parts.push(part);
        }
        let path = parts.join("/");
        check_path(&path).map_err(|err| {
            Error::invalid_parameter(format!("unsupported path {}: {err}", relative.display()))
        })?;
        Ok(Self(path))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last component of the path.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Name used for directory entries: the path with a trailing `/`.
    #[must_use]
    pub fn to_dir_name(&self) -> String {
        format!("{}/", self.0)
    }

    #[must_use]
    pub fn to_native(&self) -> PathBuf {
        self.0.split('/').collect()
    }

    /// Joins the path onto `root` using native separators.
    #[must_use]
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(self.to_native())
    }
}

impl FromStr for RelativePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn check_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::malformed("path cannot be empty"));
    }
    if path.starts_with('/') {
        return Err(Error::malformed(format!("path must be relative: {path:?}")));
    }
    if path.contains('\0') {
        return Err(Error::malformed(format!("path contains NUL: {path:?}")));
    }
    for part in path.split('/') {
        match part {
            "" => return Err(Error::malformed(format!("path cannot contain '//': {path:?}"))),
            "." | ".." => {
                return Err(Error::malformed(format!(
                    "path cannot contain '{part}' components: {path:?}"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}
