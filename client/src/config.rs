use {
    anyhow::{Context as _, Result},
    serde::{Deserialize, Serialize},
    std::path::{Path, PathBuf},
};

const CONFIG_FILE_NAME: &str = "tartarus.json5";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
    /// Globs selecting the files to archive; empty means all files.
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_compression_level() -> i32 {
    -1
}

fn default_log_filter() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
            filters: Vec::new(),
            log_file: None,
            log_filter: default_log_filter(),
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(json5::from_str(text)?)
    }

    /// Loads `path`, or the default config file if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        let text = fs_err::read_to_string(&path)?;
        Self::parse(&text).with_context(|| format!("failed to parse config {}", path.display()))
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
