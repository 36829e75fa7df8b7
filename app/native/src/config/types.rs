//! Configuration types and loading.
//!
//! The configuration file supports JSONC format (JSON with comments).
//! Both single-line (`//`) and multi-line (`/* */`) comments are allowed.

use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::APP_NAME;
use crate::constants::timing::DRAIN_INTERVAL_MS;
use crate::constants::window::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::platform::path;

/// Desktop window defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct WindowConfig {
    /// Initial width in logical points.
    pub width: u32,
    /// Initial height in logical points.
    pub height: u32,
    /// Display scale factor.
    pub scale: f64,
}

impl Default for WindowConfig {
    fn default() -> Self { Self { width: DEFAULT_WIDTH, height: DEFAULT_HEIGHT, scale: 1.0 } }
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct AresConfig {
    /// Settings directory or file handed to the engine.
    ///
    /// Supports `~`. Relative paths resolve against the directory holding
    /// this configuration file. Defaults to that directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<String>,

    /// Interval between drain cycles, in milliseconds.
    pub drain_interval_ms: u64,

    /// Log filter used when `ARES_LOG` is not set (e.g. `"info"`, `"ares_lib=debug"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Desktop window defaults.
    pub window: WindowConfig,
}

impl Default for AresConfig {
    fn default() -> Self {
        Self {
            settings_path: None,
            drain_interval_ms: DRAIN_INTERVAL_MS,
            log_level: None,
            window: WindowConfig::default(),
        }
    }
}

impl AresConfig {
    /// Resolves the settings source.
    ///
    /// `config_path` is the file this configuration was read from, if any.
    #[must_use]
    pub fn settings_source(&self, config_path: Option<&Path>) -> PathBuf {
        let base = config_path.and_then(Path::parent);

        match self.settings_path.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => path::resolve_source(raw, base),
            _ => base.map_or_else(default_config_dir, Path::to_path_buf),
        }
    }
}

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No configuration file was found in any of the expected locations.
    #[error("no configuration file found (searched {})", searched_locations())]
    NotFound,

    /// The configuration file exists but could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file contains invalid JSON.
    #[error("failed to parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration file names to search for (in priority order).
const CONFIG_FILE_NAMES: &[&str] = &["config.jsonc", "config.json"];

/// Configuration file names in the home directory.
const HOME_CONFIG_FILE_NAMES: &[&str] = &[".ares.jsonc", ".ares.json"];

fn searched_locations() -> String {
    config_paths().iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

fn default_config_dir() -> PathBuf {
    dirs::home_dir().map_or_else(|| PathBuf::from("."), |home| home.join(".config").join(APP_NAME))
}

/// Returns the possible configuration file paths in priority order.
///
/// 1. `$XDG_CONFIG_HOME/ares/config.jsonc` or `config.json`, when set
/// 2. `~/.config/ares/config.jsonc` or `config.json`
/// 3. the platform config directory (`dirs::config_dir()`)
/// 4. `~/.ares.jsonc` or `~/.ares.json`
#[must_use]
pub fn config_paths() -> Vec<PathBuf> {
    let mut dirs_to_search = Vec::new();

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        dirs_to_search.push(PathBuf::from(xdg_config).join(APP_NAME));
    }
    if let Some(home) = dirs::home_dir() {
        dirs_to_search.push(home.join(".config").join(APP_NAME));
    }
    if let Some(config_dir) = dirs::config_dir() {
        dirs_to_search.push(config_dir.join(APP_NAME));
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for dir in dirs_to_search {
        for filename in CONFIG_FILE_NAMES {
            let path = dir.join(filename);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }

    if let Some(home) = dirs::home_dir() {
        paths.extend(HOME_CONFIG_FILE_NAMES.iter().map(|name| home.join(name)));
    }

    paths
}

/// Loads configuration from a specific file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if the file does not exist,
/// `ConfigError::Io` if it cannot be read and `ConfigError::Parse` if it
/// is not valid JSONC.
pub fn load_config_from_path(path: &Path) -> Result<(AresConfig, PathBuf), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound);
    }

    let file = fs::File::open(path)?;
    let reader = json_comments::StripComments::new(file);
    let config: AresConfig = serde_json::from_reader(reader)?;
    Ok((config, path.to_path_buf()))
}

/// Loads configuration from the first existing default location.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if no configuration file exists, or the
/// read and parse errors of the first file found.
pub fn load_config() -> Result<(AresConfig, PathBuf), ConfigError> {
    config_paths()
        .into_iter()
        .find(|path| path.exists())
        .map_or(Err(ConfigError::NotFound), |path| load_config_from_path(&path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AresConfig::default();
        assert_eq!(config.drain_interval_ms, 16);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert!(config.settings_path.is_none());
    }

    #[test]
    fn test_config_deserializes_camel_case_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.jsonc");
        fs::write(
            &path,
            r#"{
                // where settings.jsonc lives
                "settingsPath": "profiles/work",
                "drainIntervalMs": 33, /* ~30 Hz */
                "logLevel": "debug",
                "window": { "width": 1024 }
            }"#,
        )
        .unwrap();

        let (config, loaded_from) = load_config_from_path(&path).unwrap();
        assert_eq!(loaded_from, path);
        assert_eq!(config.drain_interval_ms, 33);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.settings_source(Some(&path)), dir.path().join("profiles/work"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from_path(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ \"drainIntervalMs\": \"fast\" }").unwrap();

        assert!(matches!(load_config_from_path(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_settings_source_defaults_to_config_dir() {
        let config = AresConfig::default();
        let path = Path::new("/etc/ares/config.jsonc");
        assert_eq!(config.settings_source(Some(path)), PathBuf::from("/etc/ares"));

        let blank = AresConfig { settings_path: Some("  ".to_string()), ..AresConfig::default() };
        assert_eq!(blank.settings_source(Some(path)), PathBuf::from("/etc/ares"));
    }

    #[test]
    fn test_settings_source_keeps_absolute_paths() {
        let config = AresConfig {
            settings_path: Some("/srv/ares".to_string()),
            ..AresConfig::default()
        };
        assert_eq!(config.settings_source(None), PathBuf::from("/srv/ares"));
    }

    #[test]
    fn test_config_paths_end_with_home_files() {
        let paths = config_paths();
        if dirs::home_dir().is_some() {
            assert!(paths.last().unwrap().ends_with(".ares.json"));
            assert!(paths.iter().any(|p| p.ends_with("ares/config.jsonc")));
        }
    }
}
