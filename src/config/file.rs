//! Persisted configuration: the API key file.
//!
//! The file lives at `$XDG_CONFIG_HOME/brave-search/config.toml` (falling back
//! to `$HOME/.config/brave-search/config.toml`) and holds a single list:
//!
//! ```toml
//! api_keys = ["BSA...", "BSA..."]
//! ```
//!
//! On first use the file is created with an empty list and owner-only
//! permissions, so users have a template to fill in.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use super::ConfigError;

/// Directory name under the user config root.
const APP_DIR: &str = "brave-search";

/// Config file name.
const CONFIG_FILE: &str = "config.toml";

/// Contents written when the file does not exist yet.
const BOOTSTRAP_CONTENTS: &str = "# Brave Search API keys, rotated round-robin per request.\napi_keys = []\n";

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// API keys in rotation order.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl FileConfig {
    /// Parses config text, trimming keys and dropping blank ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown fields.
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.api_keys = config
            .api_keys
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        Ok(config)
    }

    /// Reads and parses the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid config TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::io(path, source))?;
        let config = Self::from_toml_str(&raw, path)?;
        debug!(path = %path.display(), keys = config.api_keys.len(), "loaded config file");
        Ok(config)
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/brave-search/config.toml`
/// 2. `$HOME/.config/brave-search/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join(CONFIG_FILE));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Creates the config file with an empty key list if it does not exist.
///
/// Returns true when a new file was written.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the directory or file cannot be created.
pub fn ensure_config_file(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ConfigError::io(parent, source))?;
    }

    let mut file = create_private(path).map_err(|source| ConfigError::io(path, source))?;
    file.write_all(BOOTSTRAP_CONTENTS.as_bytes())
        .map_err(|source| ConfigError::io(path, source))?;

    info!(path = %path.display(), "created config file");
    Ok(true)
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keys_trimmed_and_blank_dropped() {
        let raw = "api_keys = [\" k1 \", \"\", \"  \", \"k2\"]\n";
        let config = FileConfig::from_toml_str(raw, Path::new("c.toml")).unwrap();
        assert_eq!(config.api_keys, vec!["k1", "k2"]);
    }

    #[test]
    fn test_parse_empty_file_has_no_keys() {
        let config = FileConfig::from_toml_str("", Path::new("c.toml")).unwrap();
        assert!(config.api_keys.is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_field() {
        let err = FileConfig::from_toml_str("api_key = \"x\"\n", Path::new("c.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("c.toml"), "got: {err}");
    }

    #[test]
    fn test_parse_rejects_wrong_type() {
        let err = FileConfig::from_toml_str("api_keys = \"x\"\n", Path::new("c.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_ensure_config_file_bootstraps_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(ensure_config_file(&path).unwrap());
        let config = FileConfig::load(&path).unwrap();
        assert!(config.api_keys.is_empty());

        fs::write(&path, "api_keys = [\"kept\"]\n").unwrap();
        assert!(!ensure_config_file(&path).unwrap());
        assert_eq!(FileConfig::load(&path).unwrap().api_keys, vec!["kept"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_bootstrapped_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        ensure_config_file(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
