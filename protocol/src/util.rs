use {
    fs_err::{File, OpenOptions, create_dir_all},
    std::{
        io::{self, Write, stdout},
        path::Path,
    },
};

/// Returns the destination for log output.
///
/// Appends to `log_file` (creating it and its parent directories if needed),
/// or writes to stdout if no file is configured.
pub fn log_writer(log_file: Option<&Path>) -> io::Result<Box<dyn Write + Send>> {
    let Some(log_file) = log_file else {
        return Ok(Box::new(stdout()));
    };
    if let Some(parent) = log_file.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }
    let file: File = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    Ok(Box::new(file))
}
