//! Reactive snapshot store.
//!
//! The store owns the settings resources, turns dispatched engine events
//! into new immutable [`Snapshot`]s and fans them out to listeners.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──start()──▶ Active ──stop()──▶ Stopped
//!                              ▲                   │
//!                              └─────start()───────┘
//! ```
//!
//! # Update Flow
//!
//! ```text
//! engine ─▶ bridge queue ─▶ DrainPump ─▶ Store::on_event ─▶ replace() ─▶ listeners
//! ```
//!
//! Every replacement happens under a dispatch lock, so one snapshot is
//! published and all listeners have returned before the next one starts.
//! The lock is reentrant: listeners may call back into the store. A
//! replacement made from inside a listener is published at once but its
//! fan-out waits until the running one finishes, then every listener sees
//! the latest snapshot last.

mod source;
mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use eyeball::SharedObservable;
use parking_lot::{Mutex, ReentrantMutex};
pub use source::{Listener, SnapshotSource, Subscription};
pub use types::{ColorScheme, Rgba, Settings, Snapshot, Theme};

use crate::bridge::CallbackRegistrationError;
use crate::constants::timing::DRAIN_INTERVAL_MS;
use crate::context::EngineContext;
use crate::engine::{Engine, EngineError, EngineResult, HandleKind, RawHandle};
use crate::events::DomainEvent;
use crate::pump::{DrainOutcome, DrainPump, EventHandler, PumpError};
use crate::registry::{Handle, RegistryError};

// ============================================================================
// Errors
// ============================================================================

/// Fatal errors from [`Store::start`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Callback(#[from] CallbackRegistrationError),

    #[error(transparent)]
    Pump(#[from] PumpError),

    #[error("engine context has been shut down")]
    ShutDown,
}

/// A failed read through the settings handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ============================================================================
// Options
// ============================================================================

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Settings directory or file handed to the engine.
    pub settings_source: PathBuf,
    /// Interval between periodic drain cycles.
    pub drain_interval: Duration,
}

impl StoreOptions {
    #[must_use]
    pub fn new(settings_source: impl Into<PathBuf>) -> Self {
        Self {
            settings_source: settings_source.into(),
            drain_interval: Duration::from_millis(DRAIN_INTERVAL_MS),
        }
    }

    #[must_use]
    pub const fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Active,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
struct Resources {
    monitor: Handle,
    settings: Handle,
}

#[derive(Debug)]
enum Lifecycle {
    Uninitialized,
    Active(Resources),
    Stopped,
}

/// Releases partially acquired resources unless [`Acquisition::finish`] runs.
struct Acquisition<'a> {
    ctx: &'a EngineContext,
    handles: Vec<Handle>,
    installed: bool,
}

impl<'a> Acquisition<'a> {
    const fn new(ctx: &'a EngineContext) -> Self {
        Self { ctx, handles: Vec::new(), installed: false }
    }

    fn create(&mut self, kind: HandleKind) -> Result<Handle, RegistryError> {
        let handle = self.ctx.registry().create(kind)?;
        self.handles.push(handle);
        Ok(handle)
    }

    fn install(&mut self) -> Result<(), CallbackRegistrationError> {
        self.ctx.bridge().install()?;
        self.installed = true;
        Ok(())
    }

    fn finish(mut self) {
        self.handles.clear();
        self.installed = false;
    }
}

impl Drop for Acquisition<'_> {
    fn drop(&mut self) {
        if self.installed {
            self.ctx.bridge().uninstall();
        }
        for handle in self.handles.drain(..).rev() {
            self.ctx.registry().destroy(handle);
        }
    }
}

// ============================================================================
// Store
// ============================================================================

struct Inner {
    ctx: Arc<EngineContext>,
    options: StoreOptions,
    lifecycle: Mutex<Lifecycle>,
    active: AtomicBool,
    state: SharedObservable<Arc<Snapshot>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    dispatch: ReentrantMutex<()>,
    notifying: AtomicBool,
}

/// Clears the notifying flag when a fan-out ends, even by unwinding.
struct Notifying<'a>(&'a AtomicBool);

impl Drop for Notifying<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

impl Inner {
    fn settings_handle(&self) -> Option<Handle> {
        match &*self.lifecycle.lock() {
            Lifecycle::Active(resources) => Some(resources.settings),
            Lifecycle::Uninitialized | Lifecycle::Stopped => None,
        }
    }

    fn read<T>(
        &self,
        handle: Handle,
        f: impl FnOnce(&dyn Engine, RawHandle) -> EngineResult<T>,
    ) -> Result<T, ReadError> {
        let engine = self.ctx.engine().as_ref();
        Ok(self.ctx.registry().with_active(handle, |raw| f(engine, raw))??)
    }

    /// Publishes the snapshot built from the previous one and notifies listeners.
    fn replace(&self, next: impl FnOnce(&Snapshot) -> Snapshot) {
        self.update(|previous| Some(next(previous)));
    }

    /// Like [`Inner::replace`], but `next` may return `None` to keep the
    /// current snapshot and skip notification.
    fn update(&self, next: impl FnOnce(&Snapshot) -> Option<Snapshot>) {
        let _dispatch = self.dispatch.lock();

        let previous = self.state.get();
        let Some(snapshot) = next(&previous) else {
            return;
        };
        self.state.set(Arc::new(snapshot));

        // Nested call from a listener: the running fan-out picks it up.
        if self.notifying.swap(true, Ordering::AcqRel) {
            return;
        }
        let _notifying = Notifying(&self.notifying);

        loop {
            let snapshot = self.state.get();
            let listeners: Vec<Listener> =
                self.listeners.lock().iter().map(|(_, listener)| Arc::clone(listener)).collect();
            for listener in listeners {
                listener(&snapshot);
            }

            if Arc::ptr_eq(&snapshot, &self.state.get()) {
                break;
            }
        }
    }

    /// Records `error` on the snapshot. Repeating the current error publishes nothing.
    fn record_error(&self, error: impl ToString) {
        let message = error.to_string();
        self.update(|previous| {
            if previous.ready && previous.error.as_deref() == Some(message.as_str()) {
                return None;
            }
            tracing::warn!(error = %message, "store update failed");
            Some(previous.with_error(message))
        });
    }

    /// Re-reads settings and the derived theme.
    fn reload(&self) {
        let Some(handle) = self.settings_handle() else {
            tracing::debug!("store is not active, skipping reload");
            return;
        };

        let settings = match self.read(handle, |engine, raw| engine.read_settings(raw)) {
            Ok(settings) => Settings::from(settings),
            Err(err) => return self.record_error(err),
        };

        match self.read(handle, |engine, raw| engine.read_theme(raw)) {
            Ok(theme) => self.replace(|_| Snapshot::loaded(settings, Theme::from(theme))),
            Err(err) => {
                tracing::warn!(error = %err, "theme read failed, keeping previous theme");
                self.replace(|previous| Snapshot {
                    settings: Some(settings),
                    theme: previous.theme.clone(),
                    ready: true,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    /// Re-reads the theme only.
    fn reload_theme(&self) {
        let Some(handle) = self.settings_handle() else {
            return;
        };

        match self.read(handle, |engine, raw| engine.read_theme(raw)) {
            Ok(theme) => self.replace(|previous| Snapshot {
                theme: Some(Theme::from(theme)),
                ready: true,
                error: None,
                ..previous.clone()
            }),
            Err(err) => self.record_error(err),
        }
    }
}

impl EventHandler for Inner {
    fn on_event(&self, event: DomainEvent) {
        if !self.active.load(Ordering::Acquire) {
            tracing::trace!(%event, "store inactive, ignoring event");
            return;
        }

        match event {
            DomainEvent::SettingsUpdate => self.reload(),
            DomainEvent::ThemeUpdate => self.reload_theme(),
        }
    }

    fn on_drain_error(&self, error: EngineError) {
        if !self.active.load(Ordering::Acquire) {
            tracing::trace!(error = %error, "store inactive, ignoring drain error");
            return;
        }
        self.record_error(error);
    }
}

/// Latest settings and theme, kept current from engine events.
pub struct Store {
    inner: Arc<Inner>,
    pump: DrainPump,
}

impl Store {
    /// Creates an uninitialized store. Nothing touches the engine until
    /// [`Store::start`] or the first [`SnapshotSource::subscribe`].
    #[must_use]
    pub fn new(ctx: Arc<EngineContext>, options: StoreOptions) -> Self {
        Self {
            pump: DrainPump::new(Arc::clone(&ctx)),
            inner: Arc::new(Inner {
                ctx,
                options,
                lifecycle: Mutex::new(Lifecycle::Uninitialized),
                active: AtomicBool::new(false),
                state: SharedObservable::new(Arc::new(Snapshot::default())),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                dispatch: ReentrantMutex::new(()),
                notifying: AtomicBool::new(false),
            }),
        }
    }

    /// Acquires the settings resources, publishes the first snapshot and
    /// starts periodic draining. Does nothing if already active.
    ///
    /// A settings source that fails to load is not fatal: the first snapshot
    /// carries the error instead.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when resources cannot be acquired or the
    /// pump cannot start. Everything acquired so far is released.
    pub fn start(&self) -> Result<(), StoreError> {
        let ctx = &self.inner.ctx;
        if ctx.is_shut_down() {
            return Err(StoreError::ShutDown);
        }

        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if matches!(*lifecycle, Lifecycle::Active(_)) {
                return Ok(());
            }

            let mut acquisition = Acquisition::new(ctx);
            let monitor = acquisition.create(HandleKind::Monitor)?;
            let settings = acquisition.create(HandleKind::Settings)?;
            acquisition.install()?;

            let source = &self.inner.options.settings_source;
            let loaded = ctx
                .registry()
                .with_active(settings, |settings| {
                    ctx.registry().with_active(monitor, |monitor| {
                        ctx.engine().load_settings(settings, source, monitor)
                    })
                })
                .and_then(std::convert::identity)?;
            if let Err(err) = loaded {
                tracing::warn!(source = %source.display(), error = %err, "failed to load settings");
            }

            acquisition.finish();
            *lifecycle = Lifecycle::Active(Resources { monitor, settings });
            self.inner.active.store(true, Ordering::Release);
        }

        tracing::info!(source = %self.inner.options.settings_source.display(), "store started");
        self.inner.reload();

        let handler: Arc<dyn EventHandler> = self.inner.clone();
        if let Err(err) = self.pump.start(self.inner.options.drain_interval, Arc::downgrade(&handler)) {
            tracing::error!(error = %err, "failed to start drain pump");
            self.stop();
            return Err(err.into());
        }

        Ok(())
    }

    /// Uninstalls the callback, stops the pump and releases the settings
    /// resources. Safe to call in any state; only an active store moves to
    /// [`StoreState::Stopped`].
    pub fn stop(&self) {
        let resources = {
            let mut lifecycle = self.inner.lifecycle.lock();
            self.inner.active.store(false, Ordering::Release);
            match *lifecycle {
                Lifecycle::Active(resources) => {
                    *lifecycle = Lifecycle::Stopped;
                    Some(resources)
                }
                Lifecycle::Uninitialized | Lifecycle::Stopped => None,
            }
        };

        let Some(resources) = resources else {
            self.pump.stop();
            return;
        };

        let ctx = &self.inner.ctx;
        ctx.bridge().uninstall();
        self.pump.stop();

        let discarded = ctx.bridge().discard_pending();
        if discarded > 0 {
            tracing::debug!(discarded, "discarded pending events on stop");
        }

        ctx.registry().destroy(resources.settings);
        ctx.registry().destroy(resources.monitor);
        tracing::info!("store stopped");
    }

    /// Re-reads settings and theme now, as if the engine had reported a change.
    pub fn refresh(&self) {
        if self.is_active() {
            self.inner.reload();
        }
    }

    /// Runs one drain cycle on the calling thread.
    pub fn drain_now(&self) -> DrainOutcome { self.pump.drain_once(self.inner.as_ref()) }

    #[must_use]
    pub fn is_active(&self) -> bool { self.inner.active.load(Ordering::Acquire) }

    #[must_use]
    pub fn state(&self) -> StoreState {
        match &*self.inner.lifecycle.lock() {
            Lifecycle::Uninitialized => StoreState::Uninitialized,
            Lifecycle::Active(_) => StoreState::Active,
            Lifecycle::Stopped => StoreState::Stopped,
        }
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize { self.inner.listeners.lock().len() }

    #[must_use]
    pub fn context(&self) -> &Arc<EngineContext> { &self.inner.ctx }
}

impl SnapshotSource for Store {
    fn snapshot(&self) -> Arc<Snapshot> { self.inner.state.get() }

    fn subscribe(&self, listener: Listener) -> Subscription {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, listener));

        if self.state() == StoreState::Uninitialized
            && let Err(err) = self.start()
        {
            tracing::warn!(error = %err, "store failed to start on subscribe");
            self.inner.replace(|previous| previous.with_error(err.to_string()));
        }

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.lock().retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    fn watch(&self) -> eyeball::Subscriber<Arc<Snapshot>> { self.inner.state.subscribe() }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.is_active() {
            self.stop();
        }
    }
}
