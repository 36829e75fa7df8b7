//! Error types for Ares.
//!
//! Each module owns its error enum. [`AresError`] is the top-level error the
//! CLI reports; it serializes as `{ "kind": ..., "message": ... }` so the
//! `--json` output stays machine readable on failure too.

use serde::Serialize;
use thiserror::Error;

use crate::adapters::desktop::DesktopError;
use crate::config::ConfigError;
use crate::store::{ReadError, StoreError};

/// Errors that can occur while running a command.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum AresError {
    /// Invalid command arguments.
    #[error("{0}")]
    InvalidArguments(String),
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// The store could not start.
    #[error("Store error: {0}")]
    StoreError(String),
    /// Reading from the engine failed.
    #[error("Engine error: {0}")]
    EngineError(String),
    /// Window operation failed.
    #[error("Window error: {0}")]
    WindowError(String),
    /// IO error.
    #[error("IO error: {0}")]
    IoError(String),
    /// Generic command error.
    #[error("{0}")]
    CommandError(String),
}

impl From<ConfigError> for AresError {
    fn from(err: ConfigError) -> Self { Self::ConfigError(err.to_string()) }
}

impl From<StoreError> for AresError {
    fn from(err: StoreError) -> Self { Self::StoreError(err.to_string()) }
}

impl From<ReadError> for AresError {
    fn from(err: ReadError) -> Self { Self::EngineError(err.to_string()) }
}

impl From<DesktopError> for AresError {
    fn from(err: DesktopError) -> Self { Self::WindowError(err.to_string()) }
}

impl From<std::io::Error> for AresError {
    fn from(err: std::io::Error) -> Self { Self::IoError(err.to_string()) }
}

impl From<serde_json::Error> for AresError {
    fn from(err: serde_json::Error) -> Self { Self::CommandError(err.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HandleKind;
    use crate::registry::RegistryError;

    #[test]
    fn test_store_error_display() {
        let err: AresError =
            StoreError::Registry(RegistryError::Initialization(HandleKind::Monitor)).into();
        let msg = err.to_string();
        assert!(msg.starts_with("Store error"));
        assert!(msg.contains("monitor"));
    }

    #[test]
    fn test_config_error_display() {
        let err: AresError = ConfigError::NotFound.into();
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err: AresError = io_err.into();
        assert!(matches!(err, AresError::IoError(_)));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_window_error_display() {
        let err: AresError = DesktopError::Closed.into();
        assert_eq!(err.to_string(), "Window error: window is closed");
    }

    #[test]
    fn test_error_serialization() {
        let err = AresError::InvalidArguments("bad".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"kind":"InvalidArguments","message":"bad"}"#);
    }
}
