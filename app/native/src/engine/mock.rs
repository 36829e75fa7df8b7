//! Scripted engine for unit tests.
//!
//! Records every call, lets tests fail individual operations, and delivers
//! events queued with [`MockEngine::emit`] when drained.

use std::collections::{HashMap, HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{
    CallbackToken, Engine, EngineError, EngineResult, EventCallback, HandleKind, RawHandle,
    RawSettings, RawTheme, SurfaceConfig,
};
use crate::events::EventTag;

pub struct MockEngine {
    next_addr: AtomicUsize,
    live: Mutex<HashMap<usize, HandleKind>>,
    created: Mutex<HashMap<HandleKind, usize>>,
    destroyed: Mutex<Vec<(HandleKind, RawHandle)>>,
    double_frees: AtomicUsize,
    fail_create: Mutex<HashSet<HandleKind>>,

    settings: Mutex<RawSettings>,
    theme: Mutex<RawTheme>,
    loaded_from: Mutex<Option<PathBuf>>,
    fail_load: AtomicBool,
    fail_read_settings: AtomicBool,
    fail_read_theme: AtomicBool,
    settings_reads: AtomicUsize,
    theme_reads: AtomicUsize,

    callback: Mutex<Option<(CallbackToken, EventCallback)>>,
    reject_callback: AtomicBool,
    installs: AtomicUsize,
    uninstalls: AtomicUsize,
    pending: Mutex<VecDeque<(u8, Vec<u8>)>>,
    fail_drain: AtomicBool,
    drains: AtomicUsize,

    surface_sizes: Mutex<HashMap<usize, (u32, u32)>>,
    surface_scales: Mutex<HashMap<usize, (f64, f64)>>,
    deinits: AtomicUsize,
}

impl Default for MockEngine {
    fn default() -> Self { Self::new() }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            next_addr: AtomicUsize::new(0x1000),
            live: Mutex::new(HashMap::new()),
            created: Mutex::new(HashMap::new()),
            destroyed: Mutex::new(Vec::new()),
            double_frees: AtomicUsize::new(0),
            fail_create: Mutex::new(HashSet::new()),
            settings: Mutex::new(Self::sample_settings(0)),
            theme: Mutex::new(Self::sample_theme("paper")),
            loaded_from: Mutex::new(None),
            fail_load: AtomicBool::new(false),
            fail_read_settings: AtomicBool::new(false),
            fail_read_theme: AtomicBool::new(false),
            settings_reads: AtomicUsize::new(0),
            theme_reads: AtomicUsize::new(0),
            callback: Mutex::new(None),
            reject_callback: AtomicBool::new(false),
            installs: AtomicUsize::new(0),
            uninstalls: AtomicUsize::new(0),
            pending: Mutex::new(VecDeque::new()),
            fail_drain: AtomicBool::new(false),
            drains: AtomicUsize::new(0),
            surface_sizes: Mutex::new(HashMap::new()),
            surface_scales: Mutex::new(HashMap::new()),
            deinits: AtomicUsize::new(0),
        }
    }

    pub fn sample_settings(scheme: u64) -> RawSettings {
        RawSettings { scheme, light_theme: "paper".to_string(), dark_theme: "ink".to_string() }
    }

    pub fn sample_theme(name: &str) -> RawTheme {
        RawTheme {
            name: name.to_string(),
            fg: 0xFF00_0000,
            bg: 0xFFFF_FFFF,
            primary_fg: 0xFF00_FF00,
            primary_bg: 0xFF11_2233,
            muted_fg: 0xFF80_8080,
            muted_bg: 0xFFEE_EEEE,
            scroll_thumb: 0xFFCC_CCCC,
            scroll_track: 0xFFDD_DDDD,
            border: 0x8000_0000,
        }
    }

    // ------------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------------

    pub fn fail_create(&self, kind: HandleKind) { self.fail_create.lock().insert(kind); }

    pub fn set_settings(&self, settings: RawSettings) { *self.settings.lock() = settings; }

    pub fn set_theme(&self, theme: RawTheme) { *self.theme.lock() = theme; }

    pub fn set_fail_load(&self, fail: bool) { self.fail_load.store(fail, Ordering::SeqCst); }

    pub fn set_fail_read_settings(&self, fail: bool) {
        self.fail_read_settings.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_read_theme(&self, fail: bool) {
        self.fail_read_theme.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_drain(&self, fail: bool) { self.fail_drain.store(fail, Ordering::SeqCst); }

    pub fn set_reject_callback(&self, reject: bool) {
        self.reject_callback.store(reject, Ordering::SeqCst);
    }

    /// Buffers an event for the next drain.
    pub fn emit(&self, tag: EventTag) { self.emit_raw(tag.as_raw(), &[]); }

    /// Buffers a raw tag and payload for the next drain.
    pub fn emit_raw(&self, tag: u8, payload: &[u8]) {
        self.pending.lock().push_back((tag, payload.to_vec()));
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn created(&self, kind: HandleKind) -> usize {
        self.created.lock().get(&kind).copied().unwrap_or(0)
    }

    pub fn destroyed(&self, kind: HandleKind) -> usize {
        self.destroyed.lock().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn destroy_order(&self) -> Vec<HandleKind> {
        self.destroyed.lock().iter().map(|(kind, _)| *kind).collect()
    }

    pub fn double_frees(&self) -> usize { self.double_frees.load(Ordering::SeqCst) }

    pub fn live(&self) -> usize { self.live.lock().len() }

    pub fn installs(&self) -> usize { self.installs.load(Ordering::SeqCst) }

    pub fn uninstalls(&self) -> usize { self.uninstalls.load(Ordering::SeqCst) }

    pub fn has_callback(&self) -> bool { self.callback.lock().is_some() }

    pub fn drains(&self) -> usize { self.drains.load(Ordering::SeqCst) }

    pub fn settings_reads(&self) -> usize { self.settings_reads.load(Ordering::SeqCst) }

    pub fn theme_reads(&self) -> usize { self.theme_reads.load(Ordering::SeqCst) }

    pub fn loaded_from(&self) -> Option<PathBuf> { self.loaded_from.lock().clone() }

    pub fn deinits(&self) -> usize { self.deinits.load(Ordering::SeqCst) }

    pub fn surface_size(&self, surface: RawHandle) -> Option<(u32, u32)> {
        self.surface_sizes.lock().get(&surface.addr()).copied()
    }

    pub fn surface_scale(&self, surface: RawHandle) -> Option<(f64, f64)> {
        self.surface_scales.lock().get(&surface.addr()).copied()
    }

    fn allocate(&self, kind: HandleKind) -> Option<RawHandle> {
        if self.fail_create.lock().contains(&kind) {
            return None;
        }

        let addr = self.next_addr.fetch_add(0x10, Ordering::SeqCst);
        self.live.lock().insert(addr, kind);
        *self.created.lock().entry(kind).or_default() += 1;
        Some(RawHandle::from_addr(NonZeroUsize::new(addr)?))
    }
}

impl Engine for MockEngine {
    fn create(&self, kind: HandleKind) -> Option<RawHandle> {
        if kind == HandleKind::Surface {
            return None;
        }
        self.allocate(kind)
    }

    fn create_surface(&self, session: RawHandle, config: &SurfaceConfig) -> Option<RawHandle> {
        if self.live.lock().get(&session.addr()) != Some(&HandleKind::Session) {
            return None;
        }

        let surface = self.allocate(HandleKind::Surface)?;
        self.surface_sizes.lock().insert(surface.addr(), (config.width, config.height));
        self.surface_scales
            .lock()
            .insert(surface.addr(), (config.scale_factor, config.scale_factor));
        Some(surface)
    }

    fn destroy(&self, kind: HandleKind, handle: RawHandle) {
        if self.live.lock().remove(&handle.addr()).is_none() {
            self.double_frees.fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.destroyed.lock().push((kind, handle));
    }

    fn load_settings(
        &self,
        settings: RawHandle,
        source: &Path,
        monitor: RawHandle,
    ) -> EngineResult<()> {
        let live = self.live.lock();
        if live.get(&settings.addr()) != Some(&HandleKind::Settings) {
            return Err(EngineError::InvalidHandle { kind: HandleKind::Settings, handle: settings });
        }
        if live.get(&monitor.addr()) != Some(&HandleKind::Monitor) {
            return Err(EngineError::InvalidHandle { kind: HandleKind::Monitor, handle: monitor });
        }
        drop(live);

        *self.loaded_from.lock() = Some(source.to_path_buf());
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(EngineError::Load {
                path: source.display().to_string(),
                message: "scripted load failure".to_string(),
            });
        }
        Ok(())
    }

    fn read_settings(&self, _settings: RawHandle) -> EngineResult<RawSettings> {
        self.settings_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_read_settings.load(Ordering::SeqCst) {
            return Err(EngineError::read("settings", "scripted read failure"));
        }
        Ok(self.settings.lock().clone())
    }

    fn read_theme(&self, _settings: RawHandle) -> EngineResult<RawTheme> {
        self.theme_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_read_theme.load(Ordering::SeqCst) {
            return Err(EngineError::read("theme", "scripted read failure"));
        }
        Ok(self.theme.lock().clone())
    }

    fn install_callback(&self, callback: EventCallback) -> Option<CallbackToken> {
        if self.reject_callback.load(Ordering::SeqCst) {
            return None;
        }

        let count = self.installs.fetch_add(1, Ordering::SeqCst);
        let token = CallbackToken::new(RawHandle::from_addr(NonZeroUsize::new(0xC0DE + count)?));
        *self.callback.lock() = Some((token, callback));
        Some(token)
    }

    fn uninstall_callback(&self, token: CallbackToken) {
        self.uninstalls.fetch_add(1, Ordering::SeqCst);
        let mut slot = self.callback.lock();
        if slot.as_ref().is_some_and(|(current, _)| *current == token) {
            *slot = None;
        }
    }

    fn drain_events(&self) -> EngineResult<()> {
        self.drains.fetch_add(1, Ordering::SeqCst);
        if self.fail_drain.load(Ordering::SeqCst) {
            return Err(EngineError::Drain("scripted drain failure".to_string()));
        }

        let events = std::mem::take(&mut *self.pending.lock());
        let Some((_, callback)) = *self.callback.lock() else {
            return Ok(());
        };

        for (tag, payload) in events {
            let ptr = if payload.is_empty() { std::ptr::null() } else { payload.as_ptr() };
            unsafe { callback(tag, ptr, payload.len() as u64) };
        }
        Ok(())
    }

    fn set_surface_size(&self, surface: RawHandle, width: u32, height: u32) {
        self.surface_sizes.lock().insert(surface.addr(), (width, height));
    }

    fn set_surface_content_scale(&self, surface: RawHandle, x_scale: f64, y_scale: f64) {
        self.surface_scales.lock().insert(surface.addr(), (x_scale, y_scale));
    }

    fn deinit(&self) { self.deinits.fetch_add(1, Ordering::SeqCst); }
}
