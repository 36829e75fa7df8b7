//! Bindings to the native engine library (`libares_core`).
//!
//! Every method of [`NativeEngine`] is a thin wrapper over one exported
//! symbol. Views filled by the read calls point into engine-owned memory
//! that is only valid until the next call on the same handle, so strings
//! are copied out before returning.

use std::ffi::c_void;
use std::path::Path;

use super::{
    CallbackToken, Engine, EngineError, EngineResult, EventCallback, HandleKind, RawHandle,
    RawSettings, RawTheme, SurfaceConfig,
};

// ============================================================================
// FFI Types
// ============================================================================

#[repr(C)]
struct SettingsView {
    scheme: u64,
    light_theme: *const u8,
    light_theme_len: u64,
    dark_theme: *const u8,
    dark_theme_len: u64,
}

impl SettingsView {
    const fn empty() -> Self {
        Self {
            scheme: 0,
            light_theme: std::ptr::null(),
            light_theme_len: 0,
            dark_theme: std::ptr::null(),
            dark_theme_len: 0,
        }
    }
}

#[repr(C)]
struct ThemeView {
    name: *const u8,
    name_len: u64,
    fg: u32,
    bg: u32,
    primary_fg: u32,
    primary_bg: u32,
    muted_fg: u32,
    muted_bg: u32,
    scroll_thumb: u32,
    scroll_track: u32,
    border: u32,
}

impl ThemeView {
    const fn empty() -> Self {
        Self {
            name: std::ptr::null(),
            name_len: 0,
            fg: 0,
            bg: 0,
            primary_fg: 0,
            primary_bg: 0,
            muted_fg: 0,
            muted_bg: 0,
            scroll_thumb: 0,
            scroll_track: 0,
            border: 0,
        }
    }
}

#[repr(C)]
struct NativeSurfaceConfig {
    width: u32,
    height: u32,
    scale_factor: f64,
}

#[link(name = "ares_core")]
unsafe extern "C" {
    #[link_name = "createMonitor"]
    fn create_monitor() -> *mut c_void;
    #[link_name = "destroyMonitor"]
    fn destroy_monitor(monitor: *mut c_void);
    #[link_name = "createSettings"]
    fn create_settings() -> *mut c_void;
    #[link_name = "destroySettings"]
    fn destroy_settings(settings: *mut c_void);
    #[link_name = "createIo"]
    fn create_io() -> *mut c_void;
    #[link_name = "destroyIo"]
    fn destroy_io(io: *mut c_void);
    #[link_name = "createApp"]
    fn create_app() -> *mut c_void;
    #[link_name = "destroyApp"]
    fn destroy_app(app: *mut c_void);
    #[link_name = "createSurface"]
    fn create_surface(app: *mut c_void, config: *const NativeSurfaceConfig) -> *mut c_void;
    #[link_name = "destroySurface"]
    fn destroy_surface(surface: *mut c_void);
    #[link_name = "surfaceSetSize"]
    fn surface_set_size(surface: *mut c_void, width: u32, height: u32);
    #[link_name = "surfaceSetContentScale"]
    fn surface_set_content_scale(surface: *mut c_void, x_scale: f64, y_scale: f64);
    #[link_name = "loadSettings"]
    fn load_settings(
        settings: *mut c_void,
        path: *const u8,
        path_len: u64,
        monitor: *mut c_void,
    ) -> i32;
    #[link_name = "readSettings"]
    fn read_settings(settings: *mut c_void, out: *mut SettingsView) -> i32;
    #[link_name = "readTheme"]
    fn read_theme(settings: *mut c_void, out: *mut ThemeView) -> i32;
    #[link_name = "installCallback"]
    fn install_callback(callback: EventCallback) -> *mut c_void;
    #[link_name = "uninstallCallback"]
    fn uninstall_callback(token: *mut c_void);
    #[link_name = "drainEvents"]
    fn drain_events() -> i32;
    #[link_name = "deinit"]
    fn deinit();
}

/// Copies an engine-owned string. Null or invalid lengths yield an empty string.
///
/// # Safety
///
/// `ptr` must be null or point to `len` readable bytes.
unsafe fn copy_str(ptr: *const u8, len: u64) -> String {
    let Ok(len) = usize::try_from(len) else {
        return String::new();
    };
    if ptr.is_null() || len == 0 {
        return String::new();
    }

    let bytes = unsafe { std::slice::from_raw_parts(ptr, len) };
    String::from_utf8_lossy(bytes).into_owned()
}

// ============================================================================
// Engine
// ============================================================================

/// The engine provided by `libares_core`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngine;

impl NativeEngine {
    #[must_use]
    pub const fn new() -> Self { Self }
}

impl Engine for NativeEngine {
    fn create(&self, kind: HandleKind) -> Option<RawHandle> {
        let ptr = unsafe {
            match kind {
                HandleKind::Monitor => create_monitor(),
                HandleKind::Settings => create_settings(),
                HandleKind::Io => create_io(),
                HandleKind::Session => create_app(),
                HandleKind::Surface => return None,
            }
        };
        RawHandle::from_ptr(ptr)
    }

    fn create_surface(&self, session: RawHandle, config: &SurfaceConfig) -> Option<RawHandle> {
        let native = NativeSurfaceConfig {
            width: config.width,
            height: config.height,
            scale_factor: config.scale_factor,
        };
        RawHandle::from_ptr(unsafe { create_surface(session.as_ptr(), &raw const native) })
    }

    fn destroy(&self, kind: HandleKind, handle: RawHandle) {
        let ptr = handle.as_ptr();
        unsafe {
            match kind {
                HandleKind::Monitor => destroy_monitor(ptr),
                HandleKind::Settings => destroy_settings(ptr),
                HandleKind::Io => destroy_io(ptr),
                HandleKind::Session => destroy_app(ptr),
                HandleKind::Surface => destroy_surface(ptr),
            }
        }
    }

    fn load_settings(
        &self,
        settings: RawHandle,
        source: &Path,
        monitor: RawHandle,
    ) -> EngineResult<()> {
        let path = source.to_string_lossy();
        let status = unsafe {
            load_settings(settings.as_ptr(), path.as_ptr(), path.len() as u64, monitor.as_ptr())
        };

        if status == 0 {
            Ok(())
        } else {
            Err(EngineError::Load {
                path: path.into_owned(),
                message: format!("engine returned status {status}"),
            })
        }
    }

    fn read_settings(&self, settings: RawHandle) -> EngineResult<RawSettings> {
        let mut view = SettingsView::empty();
        let status = unsafe { read_settings(settings.as_ptr(), &raw mut view) };
        if status != 0 {
            return Err(EngineError::read("settings", format!("engine returned status {status}")));
        }

        Ok(RawSettings {
            scheme: view.scheme,
            light_theme: unsafe { copy_str(view.light_theme, view.light_theme_len) },
            dark_theme: unsafe { copy_str(view.dark_theme, view.dark_theme_len) },
        })
    }

    fn read_theme(&self, settings: RawHandle) -> EngineResult<RawTheme> {
        let mut view = ThemeView::empty();
        let status = unsafe { read_theme(settings.as_ptr(), &raw mut view) };
        if status != 0 {
            return Err(EngineError::read("theme", format!("engine returned status {status}")));
        }

        Ok(RawTheme {
            name: unsafe { copy_str(view.name, view.name_len) },
            fg: view.fg,
            bg: view.bg,
            primary_fg: view.primary_fg,
            primary_bg: view.primary_bg,
            muted_fg: view.muted_fg,
            muted_bg: view.muted_bg,
            scroll_thumb: view.scroll_thumb,
            scroll_track: view.scroll_track,
            border: view.border,
        })
    }

    fn install_callback(&self, callback: EventCallback) -> Option<CallbackToken> {
        RawHandle::from_ptr(unsafe { install_callback(callback) }).map(CallbackToken::new)
    }

    fn uninstall_callback(&self, token: CallbackToken) {
        unsafe { uninstall_callback(token.raw().as_ptr()) };
    }

    fn drain_events(&self) -> EngineResult<()> {
        let status = unsafe { drain_events() };
        if status == 0 {
            Ok(())
        } else {
            Err(EngineError::Drain(format!("engine returned status {status}")))
        }
    }

    fn set_surface_size(&self, surface: RawHandle, width: u32, height: u32) {
        unsafe { surface_set_size(surface.as_ptr(), width, height) };
    }

    fn set_surface_content_scale(&self, surface: RawHandle, x_scale: f64, y_scale: f64) {
        unsafe { surface_set_content_scale(surface.as_ptr(), x_scale, y_scale) };
    }

    fn deinit(&self) { unsafe { deinit() } }
}
