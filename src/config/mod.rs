//! Run configuration and the persisted API key file.
//!
//! [`RunConfig`] carries the validated options of one run. [`FileConfig`] is
//! the on-disk key list; [`resolve_key_provider`] turns an optional override
//! key plus that file into the [`KeyProvider`] the workers draw from.

mod file;
mod run;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub use file::{FileConfig, ensure_config_file, resolve_default_config_path};
pub use run::{RunConfig, parse_wait_duration};

use crate::keys::KeyProvider;

/// Errors resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config path could be derived (neither `XDG_CONFIG_HOME` nor `HOME` is set).
    #[error("cannot locate config directory: set XDG_CONFIG_HOME or HOME, or pass --config")]
    NoConfigPath,

    /// Reading or creating the config file failed.
    #[error("failed to access config file {path}: {source}")]
    Io {
        /// The config path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for this tool.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// The config path.
        path: PathBuf,
        /// The TOML decode error.
        #[source]
        source: toml::de::Error,
    },

    /// Neither `--api-key` nor any configured key is available.
    #[error(
        "no API key configured. set --api-key or add one or more keys to {} under api_keys",
        path.display()
    )]
    NoApiKeys {
        /// The config file that was consulted.
        path: PathBuf,
    },

    /// A run option is out of bounds.
    #[error("invalid configuration: {message}")]
    Validation {
        /// Which bound was violated.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Chooses the key source for a run.
///
/// A non-blank `api_key_override` wins and is used for every call. Otherwise
/// the keys in `config_path` are rotated.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] / [`ConfigError::Parse`] if the config file
/// cannot be loaded, and [`ConfigError::NoApiKeys`] if it lists no keys.
pub fn resolve_key_provider(
    api_key_override: Option<&str>,
    config_path: &Path,
) -> Result<KeyProvider, ConfigError> {
    if let Some(key) = api_key_override.map(str::trim).filter(|k| !k.is_empty()) {
        debug!("using api key from command line");
        return Ok(KeyProvider::fixed(key));
    }

    let config = FileConfig::load(config_path)?;
    if config.api_keys.is_empty() {
        return Err(ConfigError::NoApiKeys {
            path: config_path.to_path_buf(),
        });
    }

    debug!(keys = config.api_keys.len(), "rotating api keys from config");
    Ok(KeyProvider::rotating(config.api_keys))
}
