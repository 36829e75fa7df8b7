//! Application-wide constants.

/// Application name used for config directories and thread names.
pub const APP_NAME: &str = "ares";

/// Application version from Cargo.toml.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Timing constants for the drain pump and file monitoring.
pub mod timing {
    /// Default interval between drain cycles (~60 Hz).
    pub const DRAIN_INTERVAL_MS: u64 = 16;

    /// Debounce window for settings source changes.
    ///
    /// Some editors trigger multiple events per save (write to temp, rename, etc.).
    pub const MONITOR_DEBOUNCE_MS: u64 = 200;
}

/// Capacity of the pending event queue between the native callback and the pump.
pub const PENDING_EVENT_CAPACITY: usize = 1024;

/// Default desktop window geometry in logical points.
pub mod window {
    pub const DEFAULT_WIDTH: u32 = 800;
    pub const DEFAULT_HEIGHT: u32 = 600;
    pub const DEFAULT_TITLE: &str = "Ares";
}
