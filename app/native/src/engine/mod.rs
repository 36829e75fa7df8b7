//! Engine abstraction.
//!
//! The engine is the external, long-lived subsystem that owns terminal
//! sessions, settings and surfaces. This crate is a bindings client: every
//! interaction goes through the [`Engine`] trait, which mirrors the native
//! ABI one call per symbol.
//!
//! Two implementations exist:
//!
//! - [`native::NativeEngine`] (feature `native`) - links against `libares_core`
//! - [`embedded::EmbeddedEngine`] - an in-process engine honoring the same
//!   contract, used when the native library is not linked
//!
//! # Handles
//!
//! The engine hands out opaque addresses. They are carried around as
//! [`RawHandle`] and never dereferenced on this side of the boundary; the
//! [`HandleRegistry`](crate::registry::HandleRegistry) is the only place that
//! passes them back to the engine.

pub mod embedded;
#[cfg(test)]
pub(crate) mod mock;
#[cfg(feature = "native")]
pub mod native;

use std::ffi::c_void;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;

use serde::Serialize;

// ============================================================================
// Handle Types
// ============================================================================

/// The kinds of resources the engine can allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleKind {
    /// Watches a settings source for changes.
    Monitor,
    /// Holds parsed settings and the derived theme.
    Settings,
    /// I/O context for terminal sessions.
    Io,
    /// Application session that owns surfaces.
    Session,
    /// A drawable terminal surface. Requires a parent session.
    Surface,
}

impl HandleKind {
    /// Returns the lowercase name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monitor => "monitor",
            Self::Settings => "settings",
            Self::Io => "io",
            Self::Session => "session",
            Self::Surface => "surface",
        }
    }

    /// Returns all handle kinds, in teardown order (dependents first).
    #[must_use]
    pub const fn teardown_order() -> &'static [Self] {
        &[Self::Surface, Self::Session, Self::Io, Self::Settings, Self::Monitor]
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// An opaque, non-null address returned by the engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(NonZeroUsize);

impl RawHandle {
    /// Wraps a pointer returned by the engine. Returns `None` for null.
    #[must_use]
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonZeroUsize::new(ptr.expose_provenance()).map(Self)
    }

    /// Wraps a non-zero address.
    #[must_use]
    pub const fn from_addr(addr: NonZeroUsize) -> Self { Self(addr) }

    /// Returns the numeric address.
    #[must_use]
    pub const fn addr(self) -> usize { self.0.get() }

    /// Returns the address as a pointer for passing back across the boundary.
    #[must_use]
    pub fn as_ptr(self) -> *mut c_void { std::ptr::with_exposed_provenance_mut(self.addr()) }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawHandle({:#x})", self.addr())
    }
}

/// Token identifying an installed event callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackToken(RawHandle);

impl CallbackToken {
    /// Wraps a raw token returned by the engine.
    #[must_use]
    pub const fn new(raw: RawHandle) -> Self { Self(raw) }

    /// Returns the underlying raw token.
    #[must_use]
    pub const fn raw(self) -> RawHandle { self.0 }
}

/// The callback the engine invokes for every event.
///
/// Arguments: event tag, payload pointer (may be null), payload length.
/// The payload is only valid for the duration of the call.
pub type EventCallback = unsafe extern "C" fn(tag: u8, payload: *const u8, len: u64);

// ============================================================================
// Value Types
// ============================================================================

/// Settings as reported by the engine, before domain decoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawSettings {
    /// Color scheme discriminant: 0 = light, 1 = dark, 2 = system.
    pub scheme: u64,
    pub light_theme: String,
    pub dark_theme: String,
}

/// Theme as reported by the engine. Colors are packed RGBA, low byte first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTheme {
    pub name: String,
    pub fg: u32,
    pub bg: u32,
    pub primary_fg: u32,
    pub primary_bg: u32,
    pub muted_fg: u32,
    pub muted_bg: u32,
    pub scroll_thumb: u32,
    pub scroll_track: u32,
    pub border: u32,
}

/// Configuration for a new surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceConfig {
    /// Initial width in backing pixels.
    pub width: u32,
    /// Initial height in backing pixels.
    pub height: u32,
    /// Display scale factor.
    pub scale_factor: f64,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors reported by engine calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Loading settings from a source failed.
    #[error("failed to load settings from {path}: {message}")]
    Load { path: String, message: String },

    /// A read through a settings handle failed.
    #[error("failed to read {what}: {message}")]
    Read { what: &'static str, message: String },

    /// Flushing buffered events failed.
    #[error("failed to drain engine events: {0}")]
    Drain(String),

    /// The engine did not recognize a handle.
    #[error("engine does not own {kind} handle {handle:?}")]
    InvalidHandle { kind: HandleKind, handle: RawHandle },
}

impl EngineError {
    /// Creates a read error.
    #[must_use]
    pub fn read(what: &'static str, message: impl Into<String>) -> Self {
        Self::Read { what, message: message.into() }
    }
}

/// Result type alias for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// Engine Trait
// ============================================================================

/// The engine ABI, one method per native symbol.
///
/// Implementations must be callable from any thread. Calls are expected to be
/// short and non-blocking.
pub trait Engine: Send + Sync {
    /// Allocates a resource of the given kind. `Surface` is not valid here;
    /// use [`Engine::create_surface`]. Returns `None` when allocation fails.
    fn create(&self, kind: HandleKind) -> Option<RawHandle>;

    /// Allocates a surface owned by `session`.
    fn create_surface(&self, session: RawHandle, config: &SurfaceConfig) -> Option<RawHandle>;

    /// Releases a resource. Must be called at most once per handle.
    fn destroy(&self, kind: HandleKind, handle: RawHandle);

    /// Loads settings from `source` into `settings`, watching it with `monitor`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Load`] if the source cannot be loaded.
    fn load_settings(&self, settings: RawHandle, source: &Path, monitor: RawHandle)
    -> EngineResult<()>;

    /// Reads the current settings.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Read`] if the settings are unavailable.
    fn read_settings(&self, settings: RawHandle) -> EngineResult<RawSettings>;

    /// Reads the theme derived from the current settings.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Read`] if the theme is unavailable.
    fn read_theme(&self, settings: RawHandle) -> EngineResult<RawTheme>;

    /// Registers the event callback. Returns `None` if the engine rejects it.
    fn install_callback(&self, callback: EventCallback) -> Option<CallbackToken>;

    /// Unregisters a callback. No invocations happen after this returns.
    fn uninstall_callback(&self, token: CallbackToken);

    /// Flushes buffered events through the installed callback, synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Drain`] if the engine reports an internal error.
    fn drain_events(&self) -> EngineResult<()>;

    /// Resizes a surface, in backing pixels.
    fn set_surface_size(&self, surface: RawHandle, width: u32, height: u32);

    /// Updates a surface's content scale.
    fn set_surface_content_scale(&self, surface: RawHandle, x_scale: f64, y_scale: f64);

    /// Tears down engine-global state. Called once at shutdown.
    fn deinit(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_handle_rejects_null() {
        assert!(RawHandle::from_ptr(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn raw_handle_round_trips_address() {
        let addr = NonZeroUsize::new(0x1000).unwrap();
        let handle = RawHandle::from_addr(addr);
        assert_eq!(handle.addr(), 0x1000);
        assert_eq!(format!("{handle:?}"), "RawHandle(0x1000)");
    }

    #[test]
    fn teardown_order_lists_surfaces_before_sessions() {
        let order = HandleKind::teardown_order();
        let surface = order.iter().position(|k| *k == HandleKind::Surface).unwrap();
        let session = order.iter().position(|k| *k == HandleKind::Session).unwrap();
        assert!(surface < session);
        assert_eq!(order.len(), 5);
    }

    #[test]
    fn engine_error_display() {
        let err = EngineError::read("settings", "handle not loaded");
        assert_eq!(err.to_string(), "failed to read settings: handle not loaded");
    }

    #[test]
    fn handle_kind_display() {
        assert_eq!(HandleKind::Monitor.to_string(), "monitor");
        assert_eq!(HandleKind::Surface.as_str(), "surface");
    }
}
