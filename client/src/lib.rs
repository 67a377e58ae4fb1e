pub mod cli;
pub mod config;

use {
    crate::{
        cli::{Cli, Command},
        config::Config,
    },
    anyhow::{Context as _, Result, bail},
    fs_err::File,
    std::{
        env,
        io::{self, BufReader, Read},
        path::{Path, PathBuf},
        sync::Mutex,
    },
    tartarus_protocol::{Error, Passphrase, util::log_writer},
    tartarus_sdk::{
        CompressingWriter, DecompressingReader, DecryptingReader, EncryptingWriter, FinishWrite,
        PathFilter, archive, archive_compress_encrypt, decrypt_decompress_extract, extract,
        flat::{compress_combined, compress_separate, decompress_combined, decompress_separate},
    },
    tempfile::NamedTempFile,
    tracing::info,
    tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt},
};

pub const PASSPHRASE_ENV_VAR: &str = "TARTARUS_PASSPHRASE";

/// Exit code for a failed integrity check, distinct from other failures.
pub const AUTHENTICATION_FAILURE_EXIT_CODE: u8 = 2;

pub fn setup_logger(log_file: Option<PathBuf>, log_filter: String) -> Result<()> {
    let fmt_layer =
        tracing_subscriber::fmt::layer().with_writer(Mutex::new(log_writer(log_file.as_deref())?));
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::try_new(log_filter)?)
        .init();
    Ok(())
}

/// Returns the passphrase from the environment, or asks for it.
pub fn passphrase() -> Result<Passphrase> {
    let value = match env::var(PASSPHRASE_ENV_VAR) {
        Ok(value) => value,
        Err(env::VarError::NotPresent) => rpassword::prompt_password("Passphrase: ")?,
        Err(err) => bail!("invalid {PASSPHRASE_ENV_VAR}: {err}"),
    };
    if value.is_empty() {
        bail!("no passphrase provided");
    }
    Ok(value.parse()?)
}

/// Whether `err` was caused by an integrity tag mismatch.
#[must_use]
pub fn is_authentication_failure(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<Error>().is_some_and(Error::is_authentication_failure))
}

/// Creates `path` only after `write` succeeds.
///
/// The content is written to a temporary file in the same directory, so a
/// failed operation never leaves a partial output behind.
fn write_atomically<T>(
    path: &Path,
    write: impl FnOnce(&mut NamedTempFile) -> Result<T>,
) -> Result<T> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs_err::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    let output = write(&mut file)?;
    file.persist(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(output)
}

/// Copies `input` into `writer` and finalizes it.
fn copy_and_finish<W: FinishWrite>(mut input: impl Read, mut writer: W) -> Result<u64> {
    let len = io::copy(&mut input, &mut writer)?;
    writer.finish()?;
    Ok(len)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

fn filter(args: Vec<String>, config: &Config) -> PathFilter {
    if args.is_empty() {
        PathFilter::new(&config.filters)
    } else {
        PathFilter::new(args)
    }
}

pub fn run(cli: Cli, config: &Config) -> Result<()> {
    match cli.command {
        Command::Pipeline {
            input,
            output,
            level,
            filter: filter_arg,
        } => {
            let level = level.level.unwrap_or(config.compression_level);
            let filter = filter(filter_arg.filters, config).excluding(&output);
            let passphrase = passphrase()?;
            let summary = write_atomically(&output, |file| {
                let filter = filter.excluding(file.path());
                Ok(archive_compress_encrypt(&input, file, level, &passphrase, &filter)?.1)
            })?;
            summary.report();
        }
        Command::Restore { input, output } => {
            let passphrase = passphrase()?;
            decrypt_decompress_extract(open(&input)?, &output, &passphrase)?.report();
        }
        Command::Archive {
            input,
            output,
            filter: filter_arg,
        } => {
            let filter = filter(filter_arg.filters, config).excluding(&output);
            let summary = write_atomically(&output, |file| {
                let filter = filter.excluding(file.path());
                Ok(archive(&input, file, &filter)?.1)
            })?;
            summary.report();
        }
        Command::Extract { input, output } => {
            extract(open(&input)?, &output)?.report();
        }
        Command::Compress {
            input,
            output,
            level,
        } => {
            let level = level.level.unwrap_or(config.compression_level);
            let len = write_atomically(&output, |file| {
                copy_and_finish(open(&input)?, CompressingWriter::new(file, level)?)
            })?;
            info!("compressed {len} bytes into {}", output.display());
        }
        Command::Decompress { input, output } => {
            let len = write_atomically(&output, |file| {
                let mut reader = DecompressingReader::new(open(&input)?);
                Ok(io::copy(&mut reader, file).map_err(Error::from)?)
            })?;
            info!("decompressed {len} bytes into {}", output.display());
        }
        Command::Encrypt { input, output } => {
            let passphrase = passphrase()?;
            let len = write_atomically(&output, |file| {
                copy_and_finish(open(&input)?, EncryptingWriter::new(file, &passphrase)?)
            })?;
            info!("encrypted {len} bytes into {}", output.display());
        }
        Command::Decrypt { input, output } => {
            let passphrase = passphrase()?;
            let len = write_atomically(&output, |file| {
                let mut reader = DecryptingReader::new(open(&input)?, &passphrase)?;
                Ok(io::copy(&mut reader, file).map_err(Error::from)?)
            })?;
            info!("decrypted {len} bytes into {}", output.display());
        }
        Command::Pack {
            input,
            output,
            separate,
            level,
        } => {
            let level = level.level.unwrap_or(config.compression_level);
            let summary = if separate {
                compress_separate(&input, &output, level)?
            } else {
                compress_combined(&input, &output, level)?
            };
            summary.report();
        }
        Command::Unpack {
            input,
            output,
            separate,
        } => {
            let summary = if separate {
                decompress_separate(&input, &output)?
            } else {
                decompress_combined(&input, &output)?
            };
            summary.report();
        }
    }
    Ok(())
}
