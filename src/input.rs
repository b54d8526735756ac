//! Query intake from command-line values, query files and stdin.
//!
//! Sources are read in a fixed order (inline queries, then files, then
//! stdin). Every query is trimmed, blanks are dropped, and exact duplicates
//! are removed keeping the first occurrence.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

/// Errors gathering queries.
#[derive(Debug, Error)]
pub enum InputError {
    /// A query file could not be opened or read.
    #[error("failed to read query file {path}: {source}")]
    ReadFile {
        /// The query file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Reading queries from stdin failed.
    #[error("failed to read queries from stdin: {source}")]
    ReadStdin {
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Where queries come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySources {
    /// `--search-query` values; each may hold a comma-separated list.
    pub queries: Vec<String>,
    /// `--search-query-file` values; each may hold a comma-separated list of paths.
    pub files: Vec<String>,
    /// Read one query per line from stdin.
    pub use_stdin: bool,
}

/// Gathers, trims and deduplicates queries from every source.
///
/// # Errors
///
/// Returns [`InputError::ReadFile`] for an unreadable query file and
/// [`InputError::ReadStdin`] if reading `stdin` fails.
pub fn collect_queries<R: BufRead>(
    sources: &QuerySources,
    stdin: R,
) -> Result<Vec<String>, InputError> {
    let mut raw: Vec<String> = sources
        .queries
        .iter()
        .flat_map(|value| split_comma_list(value))
        .collect();

    for path in sources.files.iter().flat_map(|value| split_comma_list(value)) {
        let path = PathBuf::from(path);
        let file = File::open(&path).map_err(|source| InputError::ReadFile {
            path: path.clone(),
            source,
        })?;
        let lines = read_lines(BufReader::new(file))
            .map_err(|source| InputError::ReadFile { path: path.clone(), source })?;
        debug!(path = %path.display(), count = lines.len(), "read query file");
        raw.extend(lines);
    }

    if sources.use_stdin {
        let lines = read_lines(stdin).map_err(|source| InputError::ReadStdin { source })?;
        debug!(count = lines.len(), "read queries from stdin");
        raw.extend(lines);
    }

    Ok(dedup_queries(raw))
}

/// Trims, drops blanks and removes exact duplicates, keeping first-seen order.
#[must_use]
pub fn dedup_queries<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|q| {
            let q = q.as_ref().trim();
            (!q.is_empty() && seen.insert(q.to_string())).then(|| q.to_string())
        })
        .collect()
}

fn split_comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads non-blank trimmed lines. Invalid UTF-8 is replaced, not rejected.
fn read_lines<R: BufRead>(mut reader: R) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}
