//! Path expansion for user-supplied locations.
//!
//! Settings sources come from the CLI or the config file and may use `~` or
//! be relative to the config file's directory.

use std::path::{Path, PathBuf};

/// Expands a leading `~` to the user's home directory.
///
/// Empty or whitespace-only input yields an empty path.
#[must_use]
pub fn expand(path: &str) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return PathBuf::new();
    }

    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Expands `path` and anchors relative results at `base_dir`.
///
/// With no base directory, relative paths are returned as-is and resolve
/// against the process working directory.
#[must_use]
pub fn resolve_source(path: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = expand(path);

    match base_dir {
        Some(base) if !expanded.as_os_str().is_empty() && expanded.is_relative() => {
            base.join(expanded)
        }
        _ => expanded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_blank_is_empty() {
        assert_eq!(expand(""), PathBuf::new());
        assert_eq!(expand("   "), PathBuf::new());
    }

    #[test]
    fn expand_leaves_absolute_paths() {
        assert_eq!(expand("/opt/ares/settings"), PathBuf::from("/opt/ares/settings"));
    }

    #[test]
    fn expand_replaces_tilde() {
        let result = expand("~/ares/settings");
        assert!(!result.to_string_lossy().starts_with('~'));
        assert!(result.to_string_lossy().ends_with("ares/settings"));
    }

    #[test]
    fn resolve_anchors_relative_paths() {
        let base = Path::new("/home/user/.config/ares");
        assert_eq!(resolve_source("settings", Some(base)), base.join("settings"));
    }

    #[test]
    fn resolve_keeps_absolute_and_unanchored_paths() {
        let base = Path::new("/base");
        assert_eq!(resolve_source("/abs/settings", Some(base)), PathBuf::from("/abs/settings"));
        assert_eq!(resolve_source("settings", None), PathBuf::from("settings"));
        assert_eq!(resolve_source("", Some(base)), PathBuf::new());
    }
}
