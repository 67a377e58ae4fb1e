use {
    clap::{Args, Parser, Subcommand},
    std::path::PathBuf,
};

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Config file (default: `tartarus.json5` in the user config directory).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Overrides `log_filter` from the config.
    #[arg(long)]
    pub log_filter: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Archive, compress and encrypt a directory into a single file.
    Pipeline {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        level: LevelArg,
        #[command(flatten)]
        filter: FilterArg,
    },
    /// Decrypt, decompress and extract a file created by `pipeline`.
    Restore { input: PathBuf, output: PathBuf },
    /// Write a directory as a tar archive.
    Archive {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        filter: FilterArg,
    },
    /// Extract a tar archive into a directory.
    Extract { input: PathBuf, output: PathBuf },
    /// Compress a file with raw deflate.
    Compress {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        level: LevelArg,
    },
    /// Decompress a raw deflate file.
    Decompress { input: PathBuf, output: PathBuf },
    /// Encrypt a file.
    Encrypt { input: PathBuf, output: PathBuf },
    /// Verify and decrypt a file.
    Decrypt { input: PathBuf, output: PathBuf },
    /// Compress every file of a directory without tar.
    Pack {
        input: PathBuf,
        output: PathBuf,
        /// Write one `.deflate` file per input file instead of a combined file.
        #[arg(long)]
        separate: bool,
        #[command(flatten)]
        level: LevelArg,
    },
    /// Restore files written by `pack`.
    Unpack {
        input: PathBuf,
        output: PathBuf,
        /// The input is a directory of `.deflate` files.
        #[arg(long)]
        separate: bool,
    },
}

#[derive(Debug, Clone, Args, PartialEq, Eq)]
pub struct LevelArg {
    /// Compression level: -1 (default) or 0..=9. Overrides `compression_level` from the config.
    #[arg(long, allow_negative_numbers = true)]
    pub level: Option<i32>,
}

#[derive(Debug, Clone, Args, PartialEq, Eq)]
pub struct FilterArg {
    /// Glob matched against file names and relative paths; repeatable.
    /// Overrides `filters` from the config.
    #[arg(long = "filter", value_name = "GLOB")]
    pub filters: Vec<String>,
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pipeline_arguments() {
        let cli = Cli::try_parse_from([
            "tartarus", "pipeline", "data", "data.bin", "--level", "-1", "--filter", "*.txt",
            "--filter", "logs/*",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::Pipeline {
                input: "data".into(),
                output: "data.bin".into(),
                level: LevelArg { level: Some(-1) },
                filter: FilterArg {
                    filters: vec!["*.txt".into(), "logs/*".into()],
                },
            }
        );
    }
}
