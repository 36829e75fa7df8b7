//! In-process engine.
//!
//! [`EmbeddedEngine`] honors the same contract as the native library but
//! keeps all state in this process. Handles are synthetic addresses that are
//! never dereferenced; the objects behind them live in a map keyed by
//! address.
//!
//! # Settings Source
//!
//! A source is either a directory or a settings file. A directory is
//! searched for `settings.jsonc` then `settings.json`; a directory without
//! either uses the defaults. Themes resolve from `themes/<name>.jsonc` or
//! `themes/<name>.json` next to the settings file, falling back to the
//! built-in presets.
//!
//! ```jsonc
//! {
//!   // "light" | "dark" | "system"
//!   "scheme": "dark",
//!   "light_theme": "solarized-light",
//!   "dark_theme": "solarized-dark"
//! }
//! ```
//!
//! # Events
//!
//! Once a monitor is attached through [`Engine::load_settings`], changes to
//! the source are picked up on a background thread and buffered. Buffered
//! events reach the installed callback only when [`Engine::drain_events`]
//! runs, on the caller's thread.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use json_comments::StripComments;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;

use super::{
    CallbackToken, Engine, EngineError, EngineResult, EventCallback, HandleKind, RawHandle,
    RawSettings, RawTheme, SurfaceConfig,
};
use crate::constants::timing::MONITOR_DEBOUNCE_MS;
use crate::events::EventTag;
use crate::platform::spawn_named_thread;

/// Settings file names, in lookup order.
const SETTINGS_FILES: &[&str] = &["settings.jsonc", "settings.json"];

/// Directory holding user themes, relative to the settings file.
const THEMES_DIR: &str = "themes";

/// Synthetic addresses start here and advance by this stride.
const ADDRESS_STRIDE: usize = 0x10;

// ============================================================================
// Presets
// ============================================================================

const fn rgb(r: u8, g: u8, b: u8) -> u32 { u32::from_le_bytes([r, g, b, 0xff]) }

fn preset(name: &str) -> Option<RawTheme> {
    let theme = match name {
        "solarized-light" => RawTheme {
            name: name.to_string(),
            fg: rgb(0x65, 0x7b, 0x83),
            bg: rgb(0xfd, 0xf6, 0xe3),
            primary_fg: rgb(0xfd, 0xf6, 0xe3),
            primary_bg: rgb(0x26, 0x8b, 0xd2),
            muted_fg: rgb(0x93, 0xa1, 0xa1),
            muted_bg: rgb(0xee, 0xe8, 0xd5),
            scroll_thumb: rgb(0x93, 0xa1, 0xa1),
            scroll_track: rgb(0xee, 0xe8, 0xd5),
            border: rgb(0xee, 0xe8, 0xd5),
        },
        "solarized-dark" => RawTheme {
            name: name.to_string(),
            fg: rgb(0x83, 0x94, 0x96),
            bg: rgb(0x00, 0x2b, 0x36),
            primary_fg: rgb(0x00, 0x2b, 0x36),
            primary_bg: rgb(0x26, 0x8b, 0xd2),
            muted_fg: rgb(0x58, 0x6e, 0x75),
            muted_bg: rgb(0x07, 0x36, 0x42),
            scroll_thumb: rgb(0x58, 0x6e, 0x75),
            scroll_track: rgb(0x07, 0x36, 0x42),
            border: rgb(0x07, 0x36, 0x42),
        },
        _ => return None,
    };

    Some(theme)
}

// ============================================================================
// Source Files
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SchemeName {
    Light,
    Dark,
    #[default]
    System,
}

impl SchemeName {
    const fn as_raw(self) -> u64 {
        match self {
            Self::Light => 0,
            Self::Dark => 1,
            Self::System => 2,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SettingsFile {
    scheme: SchemeName,
    light_theme: String,
    dark_theme: String,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            scheme: SchemeName::System,
            light_theme: "solarized-light".to_string(),
            dark_theme: "solarized-dark".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ThemeFile {
    name: Option<String>,
    fg: String,
    bg: String,
    primary_fg: String,
    primary_bg: String,
    muted_fg: String,
    muted_bg: String,
    scroll_thumb: String,
    scroll_track: String,
    border: String,
}

/// Parses `#RRGGBB` or `#RRGGBBAA` into a packed color, low byte first.
fn parse_hex_color(value: &str) -> Option<u32> {
    let hex = value.trim().strip_prefix('#')?;
    if !hex.is_ascii() || !matches!(hex.len(), 6 | 8) {
        return None;
    }

    let channel = |index: usize| u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16).ok();
    let alpha = if hex.len() == 8 { channel(3)? } else { 0xff };

    Some(u32::from_le_bytes([channel(0)?, channel(1)?, channel(2)?, alpha]))
}

impl ThemeFile {
    fn into_raw(self, fallback_name: &str) -> Result<RawTheme, String> {
        let color = |field: &str, value: &str| {
            parse_hex_color(value).ok_or_else(|| format!("invalid color for {field}: {value}"))
        };

        Ok(RawTheme {
            fg: color("fg", &self.fg)?,
            bg: color("bg", &self.bg)?,
            primary_fg: color("primary_fg", &self.primary_fg)?,
            primary_bg: color("primary_bg", &self.primary_bg)?,
            muted_fg: color("muted_fg", &self.muted_fg)?,
            muted_bg: color("muted_bg", &self.muted_bg)?,
            scroll_thumb: color("scroll_thumb", &self.scroll_thumb)?,
            scroll_track: color("scroll_track", &self.scroll_track)?,
            border: color("border", &self.border)?,
            name: self.name.unwrap_or_else(|| fallback_name.to_string()),
        })
    }
}

fn read_jsonc<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let file = File::open(path).map_err(|err| format!("{}: {err}", path.display()))?;
    let reader = StripComments::new(BufReader::new(file));
    serde_json::from_reader(reader).map_err(|err| format!("{}: {err}", path.display()))
}

fn first_existing(dir: &Path, names: impl IntoIterator<Item = String>) -> Option<PathBuf> {
    names.into_iter().map(|name| dir.join(name)).find(|path| path.is_file())
}

/// Settings and theme parsed from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Loaded {
    settings: RawSettings,
    theme: RawTheme,
}

fn load_source(source: &Path) -> Result<Loaded, String> {
    let (root, settings_file) = if source.is_dir() {
        let file = first_existing(source, SETTINGS_FILES.iter().map(ToString::to_string));
        (source.to_path_buf(), file)
    } else if source.is_file() {
        let root = source.parent().map(Path::to_path_buf).unwrap_or_default();
        (root, Some(source.to_path_buf()))
    } else {
        return Err(format!("{}: no such file or directory", source.display()));
    };

    let file: SettingsFile = match settings_file {
        Some(path) => read_jsonc(&path)?,
        None => SettingsFile::default(),
    };

    let active = match file.scheme {
        SchemeName::Dark => &file.dark_theme,
        SchemeName::Light | SchemeName::System => &file.light_theme,
    };
    let theme = load_theme(&root.join(THEMES_DIR), active)?;

    Ok(Loaded {
        settings: RawSettings {
            scheme: file.scheme.as_raw(),
            light_theme: file.light_theme,
            dark_theme: file.dark_theme,
        },
        theme,
    })
}

fn load_theme(themes_dir: &Path, name: &str) -> Result<RawTheme, String> {
    let candidates = ["jsonc", "json"].map(|ext| format!("{name}.{ext}"));

    if let Some(path) = first_existing(themes_dir, candidates) {
        return read_jsonc::<ThemeFile>(&path)?.into_raw(name);
    }

    preset(name).ok_or_else(|| format!("unknown theme '{name}'"))
}

// ============================================================================
// Objects
// ============================================================================

#[derive(Debug, Default)]
enum SettingsState {
    #[default]
    Unloaded,
    Loaded(Box<Loaded>),
    Failed(String),
}

impl SettingsState {
    fn from_result(result: Result<Loaded, String>) -> Self {
        match result {
            Ok(loaded) => Self::Loaded(Box::new(loaded)),
            Err(message) => Self::Failed(message),
        }
    }

    /// Returns the event describing the transition to `next`, if any.
    fn change_to(&self, next: &Self) -> Option<EventTag> {
        match (self, next) {
            (Self::Loaded(prev), Self::Loaded(next)) if prev.settings != next.settings => {
                Some(EventTag::SettingsUpdate)
            }
            (Self::Loaded(prev), Self::Loaded(next)) if prev.theme != next.theme => {
                Some(EventTag::ThemeUpdate)
            }
            (Self::Loaded(_), Self::Loaded(_)) => None,
            (Self::Failed(prev), Self::Failed(next)) if prev == next => None,
            _ => Some(EventTag::SettingsUpdate),
        }
    }
}

#[derive(Debug, Default)]
struct SettingsSlot {
    source: Option<PathBuf>,
    state: SettingsState,
}

/// Current geometry of a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMetrics {
    pub width: u32,
    pub height: u32,
    pub x_scale: f64,
    pub y_scale: f64,
}

enum Object {
    Monitor(Option<RecommendedWatcher>),
    Settings(SettingsSlot),
    Io,
    Session,
    Surface { session: usize, metrics: SurfaceMetrics },
}

impl Object {
    const fn kind(&self) -> HandleKind {
        match self {
            Self::Monitor(_) => HandleKind::Monitor,
            Self::Settings(_) => HandleKind::Settings,
            Self::Io => HandleKind::Io,
            Self::Session => HandleKind::Session,
            Self::Surface { .. } => HandleKind::Surface,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

struct Inner {
    next_addr: AtomicUsize,
    objects: DashMap<usize, Object>,
    callback: RwLock<Option<(CallbackToken, EventCallback)>>,
    pending: Mutex<VecDeque<EventTag>>,
    /// Serializes reloads so a slow read never overwrites a newer one.
    reloading: Mutex<()>,
    deinitialized: AtomicBool,
}

impl Inner {
    fn allocate(&self, object: Object) -> Option<RawHandle> {
        if self.deinitialized.load(Ordering::Acquire) {
            return None;
        }

        let addr = self.next_addr.fetch_add(ADDRESS_STRIDE, Ordering::Relaxed);
        let handle = RawHandle::from_addr(NonZeroUsize::new(addr)?);
        self.objects.insert(addr, object);
        Some(handle)
    }

    fn is_kind(&self, handle: RawHandle, kind: HandleKind) -> bool {
        self.objects.get(&handle.addr()).is_some_and(|object| object.kind() == kind)
    }

    fn with_settings<T>(
        &self,
        handle: RawHandle,
        f: impl FnOnce(&SettingsSlot) -> EngineResult<T>,
    ) -> EngineResult<T> {
        match self.objects.get(&handle.addr()).as_deref() {
            Some(Object::Settings(slot)) => f(slot),
            _ => Err(EngineError::InvalidHandle { kind: HandleKind::Settings, handle }),
        }
    }

    /// Re-reads the source of a settings object and buffers the resulting event.
    fn reload(&self, settings: usize) -> Option<EventTag> {
        let _reloading = self.reloading.lock();
        let source = match self.objects.get(&settings).as_deref() {
            Some(Object::Settings(slot)) => slot.source.clone()?,
            _ => return None,
        };

        let next = SettingsState::from_result(load_source(&source));

        let tag = {
            let mut entry = self.objects.get_mut(&settings)?;
            let Object::Settings(slot) = entry.value_mut() else {
                return None;
            };
            let tag = slot.state.change_to(&next);
            if let SettingsState::Failed(message) = &next {
                tracing::warn!(source = %source.display(), error = %message, "settings source is invalid");
            }
            slot.state = next;
            tag
        }?;

        tracing::debug!(source = %source.display(), ?tag, "settings source changed");
        self.pending.lock().push_back(tag);
        Some(tag)
    }
}

/// Engine implementation that runs inside this process.
pub struct EmbeddedEngine {
    inner: Arc<Inner>,
}

impl Default for EmbeddedEngine {
    fn default() -> Self { Self::new() }
}

impl EmbeddedEngine {
    /// Creates an engine with no resources.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_addr: AtomicUsize::new(0x1000),
                objects: DashMap::new(),
                callback: RwLock::new(None),
                pending: Mutex::new(VecDeque::new()),
                reloading: Mutex::new(()),
                deinitialized: AtomicBool::new(false),
            }),
        }
    }

    /// Re-reads every loaded settings source now, without waiting for the
    /// monitor. Returns the number of events buffered.
    pub fn refresh(&self) -> usize {
        let loaded: Vec<usize> = self
            .inner
            .objects
            .iter()
            .filter(|entry| matches!(entry.value(), Object::Settings(slot) if slot.source.is_some()))
            .map(|entry| *entry.key())
            .collect();

        loaded.into_iter().filter_map(|addr| self.inner.reload(addr)).count()
    }

    /// Returns the number of live resources.
    #[must_use]
    pub fn live_handles(&self) -> usize { self.inner.objects.len() }

    /// Returns the number of live resources of one kind.
    #[must_use]
    pub fn live_handles_of(&self, kind: HandleKind) -> usize {
        self.inner.objects.iter().filter(|entry| entry.value().kind() == kind).count()
    }

    /// Returns whether a callback is installed.
    #[must_use]
    pub fn has_callback(&self) -> bool { self.inner.callback.read().is_some() }

    /// Returns the number of buffered events awaiting a drain.
    #[must_use]
    pub fn pending_events(&self) -> usize { self.inner.pending.lock().len() }

    /// Returns the geometry last applied to a surface.
    #[must_use]
    pub fn surface_metrics(&self, surface: RawHandle) -> Option<SurfaceMetrics> {
        match self.inner.objects.get(&surface.addr()).as_deref() {
            Some(Object::Surface { metrics, .. }) => Some(*metrics),
            _ => None,
        }
    }

    fn attach_monitor(&self, monitor: RawHandle, settings: RawHandle, source: &Path) {
        let root = if source.is_dir() {
            source.to_path_buf()
        } else {
            source.parent().map(Path::to_path_buf).unwrap_or_default()
        };

        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = match notify::recommended_watcher(tx) {
            Ok(watcher) => watcher,
            Err(err) => {
                tracing::warn!(error = %err, "failed to create settings watcher");
                return;
            }
        };

        if let Err(err) = watcher.watch(&root, RecursiveMode::Recursive) {
            tracing::warn!(path = %root.display(), error = %err, "failed to watch settings source");
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let settings = settings.addr();
        if spawn_named_thread("monitor", move || run_monitor(&rx, &weak, settings)).is_none() {
            return;
        }

        if let Some(mut entry) = self.inner.objects.get_mut(&monitor.addr())
            && let Object::Monitor(slot) = entry.value_mut()
        {
            *slot = Some(watcher);
        }
    }
}

/// Monitor loop. Ends when the watcher is dropped or the engine is gone.
fn run_monitor(
    rx: &Receiver<notify::Result<notify::Event>>,
    inner: &Weak<Inner>,
    settings: usize,
) {
    let debounce = Duration::from_millis(MONITOR_DEBOUNCE_MS);

    while let Ok(event) = rx.recv() {
        match event {
            Ok(event) if event.kind.is_access() => continue,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "settings watch error");
                continue;
            }
        }

        // Coalesce the burst of events an editor produces per save.
        loop {
            match rx.recv_timeout(debounce) {
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }

        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.reload(settings);
    }
}

impl Engine for EmbeddedEngine {
    fn create(&self, kind: HandleKind) -> Option<RawHandle> {
        let object = match kind {
            HandleKind::Monitor => Object::Monitor(None),
            HandleKind::Settings => Object::Settings(SettingsSlot::default()),
            HandleKind::Io => Object::Io,
            HandleKind::Session => Object::Session,
            HandleKind::Surface => return None,
        };

        self.inner.allocate(object)
    }

    fn create_surface(&self, session: RawHandle, config: &SurfaceConfig) -> Option<RawHandle> {
        if !self.inner.is_kind(session, HandleKind::Session) {
            tracing::warn!(session = ?session, "surface requested for unknown session");
            return None;
        }

        self.inner.allocate(Object::Surface {
            session: session.addr(),
            metrics: SurfaceMetrics {
                width: config.width,
                height: config.height,
                x_scale: config.scale_factor,
                y_scale: config.scale_factor,
            },
        })
    }

    fn destroy(&self, kind: HandleKind, handle: RawHandle) {
        let removed = self.inner.objects.remove_if(&handle.addr(), |_, object| object.kind() == kind);

        match removed {
            Some((_, Object::Session)) => {
                let orphaned = self
                    .inner
                    .objects
                    .iter()
                    .filter(|entry| {
                        matches!(entry.value(), Object::Surface { session, .. } if *session == handle.addr())
                    })
                    .count();
                if orphaned > 0 {
                    tracing::warn!(orphaned, "session destroyed before its surfaces");
                }
            }
            Some(_) => {}
            None => tracing::warn!(%kind, handle = ?handle, "destroy of unknown handle"),
        }
    }

    fn load_settings(
        &self,
        settings: RawHandle,
        source: &Path,
        monitor: RawHandle,
    ) -> EngineResult<()> {
        if !self.inner.is_kind(monitor, HandleKind::Monitor) {
            return Err(EngineError::InvalidHandle { kind: HandleKind::Monitor, handle: monitor });
        }

        let result = load_source(source);
        let error = result.as_ref().err().cloned();

        match self.inner.objects.get_mut(&settings.addr()) {
            Some(mut entry) if entry.kind() == HandleKind::Settings => {
                if let Object::Settings(slot) = entry.value_mut() {
                    slot.source = Some(source.to_path_buf());
                    slot.state = SettingsState::from_result(result);
                }
            }
            _ => {
                return Err(EngineError::InvalidHandle { kind: HandleKind::Settings, handle: settings });
            }
        }

        self.attach_monitor(monitor, settings, source);

        match error {
            Some(message) => Err(EngineError::Load { path: source.display().to_string(), message }),
            None => Ok(()),
        }
    }

    fn read_settings(&self, settings: RawHandle) -> EngineResult<RawSettings> {
        self.inner.with_settings(settings, |slot| match &slot.state {
            SettingsState::Loaded(loaded) => Ok(loaded.settings.clone()),
            SettingsState::Failed(message) => Err(EngineError::read("settings", message.clone())),
            SettingsState::Unloaded => Err(EngineError::read("settings", "no settings loaded")),
        })
    }

    fn read_theme(&self, settings: RawHandle) -> EngineResult<RawTheme> {
        self.inner.with_settings(settings, |slot| match &slot.state {
            SettingsState::Loaded(loaded) => Ok(loaded.theme.clone()),
            SettingsState::Failed(message) => Err(EngineError::read("theme", message.clone())),
            SettingsState::Unloaded => Err(EngineError::read("theme", "no settings loaded")),
        })
    }

    fn install_callback(&self, callback: EventCallback) -> Option<CallbackToken> {
        if self.inner.deinitialized.load(Ordering::Acquire) {
            return None;
        }

        let addr = self.inner.next_addr.fetch_add(ADDRESS_STRIDE, Ordering::Relaxed);
        let token = CallbackToken::new(RawHandle::from_addr(NonZeroUsize::new(addr)?));
        *self.inner.callback.write() = Some((token, callback));
        Some(token)
    }

    fn uninstall_callback(&self, token: CallbackToken) {
        let mut slot = self.inner.callback.write();
        if slot.as_ref().is_some_and(|(current, _)| *current == token) {
            *slot = None;
        }
    }

    fn drain_events(&self) -> EngineResult<()> {
        if self.inner.deinitialized.load(Ordering::Acquire) {
            return Err(EngineError::Drain("engine is deinitialized".to_string()));
        }

        let events = std::mem::take(&mut *self.inner.pending.lock());
        if events.is_empty() {
            return Ok(());
        }

        let Some((_, callback)) = *self.inner.callback.read() else {
            tracing::debug!(count = events.len(), "no callback installed, discarding events");
            return Ok(());
        };

        for tag in events {
            // SAFETY: the callback was registered through `install_callback`,
            // which requires a function that tolerates a null payload.
            unsafe { callback(tag.as_raw(), std::ptr::null(), 0) };
        }

        Ok(())
    }

    fn set_surface_size(&self, surface: RawHandle, width: u32, height: u32) {
        if let Some(mut entry) = self.inner.objects.get_mut(&surface.addr())
            && let Object::Surface { metrics, .. } = entry.value_mut()
        {
            metrics.width = width;
            metrics.height = height;
        }
    }

    fn set_surface_content_scale(&self, surface: RawHandle, x_scale: f64, y_scale: f64) {
        if let Some(mut entry) = self.inner.objects.get_mut(&surface.addr())
            && let Object::Surface { metrics, .. } = entry.value_mut()
        {
            metrics.x_scale = x_scale;
            metrics.y_scale = y_scale;
        }
    }

    fn deinit(&self) {
        if self.inner.deinitialized.swap(true, Ordering::AcqRel) {
            return;
        }

        *self.inner.callback.write() = None;
        self.inner.pending.lock().clear();

        let leaked = self.inner.objects.len();
        if leaked > 0 {
            tracing::warn!(leaked, "engine deinitialized with live handles");
        }
        self.inner.objects.clear();
    }
}
