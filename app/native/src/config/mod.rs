//! Configuration module for Ares.
//!
//! This module provides the configuration types, loading, and JSON schema
//! generation. Configuration is loaded once by the binary and handed to the
//! components that need it; nothing here is global.
//!
//! The configuration file supports JSONC format (JSON with comments).

pub mod types;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use types::{
    AresConfig, ConfigError, WindowConfig, config_paths, load_config as load_config_default,
    load_config_from_path,
};

use crate::adapters::desktop::WindowOptions;
use crate::constants::window::DEFAULT_TITLE;
use crate::store::StoreOptions;

/// Schema identifier published with the generated schema.
const SCHEMA_ID: &str = "https://raw.githubusercontent.com/ares-term/ares/main/ares.schema.json";

/// A configuration together with the file it came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadedConfig {
    pub config: AresConfig,
    /// `None` when running on defaults.
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    /// Returns the resolved settings source.
    #[must_use]
    pub fn settings_source(&self) -> PathBuf { self.config.settings_source(self.path.as_deref()) }

    /// Builds store options, with `settings_override` taking precedence over the file.
    #[must_use]
    pub fn store_options(&self, settings_override: Option<&Path>) -> StoreOptions {
        let source =
            settings_override.map_or_else(|| self.settings_source(), Path::to_path_buf);
        StoreOptions::new(source)
            .with_drain_interval(Duration::from_millis(self.config.drain_interval_ms.max(1)))
    }

    /// Builds desktop window options from the `window` section.
    #[must_use]
    pub fn window_options(&self) -> WindowOptions {
        let window = &self.config.window;
        WindowOptions {
            title: DEFAULT_TITLE.to_string(),
            width: window.width,
            height: window.height,
            scale_factor: window.scale,
        }
    }
}

/// Loads configuration from `custom` or the default search paths.
///
/// # Errors
///
/// Returns a [`ConfigError`] if no file is found or the file is invalid.
pub fn try_load(custom: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let (config, path) = custom.map_or_else(load_config_default, load_config_from_path)?;
    Ok(LoadedConfig { config, path: Some(path) })
}

/// Loads configuration, falling back to defaults when none is usable.
#[must_use]
pub fn load(custom: Option<&Path>) -> LoadedConfig {
    match try_load(custom) {
        Ok(loaded) => loaded,
        Err(ConfigError::NotFound) if custom.is_none() => {
            tracing::debug!("no configuration file found, using defaults");
            LoadedConfig::default()
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to load configuration, using defaults");
            LoadedConfig::default()
        }
    }
}

/// Generates a JSON Schema for the configuration file.
#[must_use]
pub fn generate_schema() -> schemars::Schema {
    let mut schema = schemars::schema_for!(AresConfig);

    if let Some(obj) = schema.as_object_mut() {
        obj.insert("$id".to_string(), serde_json::json!(SCHEMA_ID));
    }

    schema
}

/// Generates the configuration schema as pretty-printed JSON.
#[must_use]
pub fn generate_schema_json() -> String {
    serde_json::to_string_pretty(&generate_schema()).unwrap_or_default()
}
