//! Result output: live line emission and the final sorted file.
//!
//! Result lines only ever go through a [`LineWriter`]; logging goes to stderr
//! via `tracing`, so `--silent` runs can pipe stdout straight into other tools.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::Builder;
use thiserror::Error;
use tracing::debug;

/// Mode for newly created output files, subject to the process umask.
#[cfg(unix)]
const OUTPUT_FILE_MODE: u32 = 0o644;

/// Errors writing the output file.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Creating, writing or replacing the file failed.
    #[error("failed to write output file {path}: {source}")]
    Write {
        /// Destination path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl OutputError {
    fn write(path: &Path, source: io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Sink for newly discovered result lines.
///
/// Called concurrently from every worker; each call must emit one whole line.
pub trait LineWriter: Send + Sync {
    /// Emits one result line.
    fn print_line(&self, line: &str);
}

/// Writes result lines to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutWriter;

impl LineWriter for StdoutWriter {
    fn print_line(&self, line: &str) {
        let mut stdout = io::stdout().lock();
        // A closed pipe (e.g. `| head`) must not abort the run.
        if let Err(e) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
            debug!(error = %e, "failed to write result line to stdout");
        }
    }
}

/// Collects result lines in memory.
#[derive(Debug, Default)]
pub struct CollectingWriter {
    lines: Mutex<Vec<String>>,
}

impl CollectingWriter {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lines collected so far, in emission order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl LineWriter for CollectingWriter {
    fn print_line(&self, line: &str) {
        let mut lines = self
            .lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        lines.push(line.to_string());
    }
}

/// Writes `lines` to `path`, one per line, replacing any existing file.
///
/// The content is written to a temporary file in the same directory and then
/// renamed over the destination, so readers never observe a partial file.
///
/// # Errors
///
/// Returns [`OutputError::Write`] if the temporary file cannot be created or
/// written, or the final rename fails.
pub fn write_lines_to_file<I, S>(path: &Path, lines: I) -> Result<(), OutputError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = temp_builder()
        .tempfile_in(dir)
        .map_err(|e| OutputError::write(path, e))?;
    // Replacing a file keeps its permissions.
    if let Ok(existing) = fs::metadata(path) {
        temp.as_file()
            .set_permissions(existing.permissions())
            .map_err(|e| OutputError::write(path, e))?;
    }
    {
        let mut writer = io::BufWriter::new(temp.as_file_mut());
        for line in lines {
            writeln!(writer, "{}", line.as_ref()).map_err(|e| OutputError::write(path, e))?;
        }
        writer.flush().map_err(|e| OutputError::write(path, e))?;
    }

    temp.persist(path)
        .map_err(|e| OutputError::write(path, e.error))?;
    Ok(())
}

/// Temp file builder; new output files are world-readable (0644 before umask).
#[cfg(unix)]
fn temp_builder() -> Builder<'static, 'static> {
    use std::os::unix::fs::PermissionsExt;

    let mut builder = Builder::new();
    builder.permissions(fs::Permissions::from_mode(OUTPUT_FILE_MODE));
    builder
}

#[cfg(not(unix))]
fn temp_builder() -> Builder<'static, 'static> {
    Builder::new()
}
