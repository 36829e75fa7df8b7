//! Desktop window adapter.
//!
//! A [`DesktopWindow`] owns an engine session and one surface through a
//! [`SurfaceAdapter`], and tracks the latest snapshot for its title and
//! appearance. Window chrome is the host toolkit's business; this type only
//! keeps the engine side in sync with it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::constants::window::{DEFAULT_HEIGHT, DEFAULT_TITLE, DEFAULT_WIDTH};
use crate::context::EngineContext;
use crate::engine::{HandleKind, SurfaceConfig};
use crate::registry::{Handle, RegistryError};
use crate::store::{ColorScheme, Rgba, Snapshot, SnapshotSource, Subscription};

// ============================================================================
// Types
// ============================================================================

/// Errors from window and surface operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DesktopError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid window size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("invalid scale factor {0}")]
    InvalidScale(f64),

    #[error("window is closed")]
    Closed,
}

/// Initial window geometry, in logical points.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            scale_factor: 1.0,
        }
    }
}

/// Light or dark window chrome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Appearance {
    #[default]
    Light,
    Dark,
}

impl Appearance {
    /// Picks the appearance for a snapshot. `System` follows the theme's background.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let scheme = snapshot.settings.as_ref().map_or(ColorScheme::System, |s| s.scheme);
        match scheme {
            ColorScheme::Light => Self::Light,
            ColorScheme::Dark => Self::Dark,
            ColorScheme::System => {
                if snapshot.theme.as_ref().is_some_and(crate::store::Theme::is_dark) {
                    Self::Dark
                } else {
                    Self::Light
                }
            }
        }
    }
}

/// Backing pixel size for a logical size at a scale factor.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn backing_size(width: u32, height: u32, scale: f64) -> Result<(u32, u32), DesktopError> {
    if width == 0 || height == 0 {
        return Err(DesktopError::InvalidSize { width, height });
    }
    if !scale.is_finite() || scale <= 0.0 {
        return Err(DesktopError::InvalidScale(scale));
    }

    let scaled = |value: u32| (f64::from(value) * scale).round().min(f64::from(u32::MAX)) as u32;
    Ok((scaled(width).max(1), scaled(height).max(1)))
}

// ============================================================================
// Surface Adapter
// ============================================================================

/// An engine session with one surface, released in dependency order.
pub struct SurfaceAdapter {
    ctx: Arc<EngineContext>,
    session: Handle,
    surface: Handle,
    closed: bool,
}

impl SurfaceAdapter {
    /// Creates a session and a surface of `config` inside it.
    ///
    /// # Errors
    ///
    /// Returns [`DesktopError::Registry`] if either allocation fails. A
    /// session created before a failed surface allocation is released.
    pub fn new(ctx: Arc<EngineContext>, config: &SurfaceConfig) -> Result<Self, DesktopError> {
        let registry = ctx.registry();
        let session = registry.create(HandleKind::Session)?;

        let surface = match registry.create_surface(session, config) {
            Ok(surface) => surface,
            Err(err) => {
                registry.destroy(session);
                return Err(err.into());
            }
        };

        Ok(Self { ctx, session, surface, closed: false })
    }

    /// Forwards a backing size and content scale to the surface.
    ///
    /// # Errors
    ///
    /// Returns [`DesktopError::Closed`] after [`SurfaceAdapter::close`], or a
    /// registry error if the surface is gone.
    pub fn resize(&self, width: u32, height: u32, scale: f64) -> Result<(), DesktopError> {
        if self.closed {
            return Err(DesktopError::Closed);
        }

        let engine = self.ctx.engine();
        self.ctx.registry().with_active(self.surface, |raw| {
            engine.set_surface_size(raw, width, height);
            engine.set_surface_content_scale(raw, scale, scale);
        })?;
        Ok(())
    }

    /// Destroys the surface, then the session. Idempotent.
    pub fn close(&mut self) {
        if std::mem::replace(&mut self.closed, true) {
            return;
        }

        let registry = self.ctx.registry();
        registry.destroy(self.surface);
        registry.destroy(self.session);
    }

    #[must_use]
    pub const fn session(&self) -> Handle { self.session }

    #[must_use]
    pub const fn surface(&self) -> Handle { self.surface }

    #[must_use]
    pub const fn is_closed(&self) -> bool { self.closed }
}

impl Drop for SurfaceAdapter {
    fn drop(&mut self) { self.close(); }
}

impl fmt::Debug for SurfaceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceAdapter")
            .field("session", &self.session)
            .field("surface", &self.surface)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Window
// ============================================================================

#[derive(Debug, Clone)]
struct WindowView {
    title: String,
    appearance: Appearance,
    background: Option<Rgba>,
    updates: u64,
}

impl WindowView {
    fn apply(&mut self, base_title: &str, snapshot: &Snapshot) {
        self.title = match &snapshot.theme {
            Some(theme) => format!("{base_title} ({})", theme.name),
            None => base_title.to_string(),
        };
        self.appearance = Appearance::from_snapshot(snapshot);
        self.background = snapshot.theme.as_ref().map(|theme| theme.bg);
        self.updates += 1;
    }
}

/// A window backed by an engine surface.
pub struct DesktopWindow {
    surface: SurfaceAdapter,
    source: Arc<dyn SnapshotSource>,
    options: WindowOptions,
    view: Arc<Mutex<WindowView>>,
    subscription: Option<Subscription>,
    size: (u32, u32),
    scale: f64,
}

impl fmt::Debug for DesktopWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DesktopWindow")
            .field("surface", &self.surface)
            .field("size", &self.size)
            .field("scale", &self.scale)
            .field("showing", &self.subscription.is_some())
            .finish_non_exhaustive()
    }
}

/// Creates a hidden window and its surface. Call [`DesktopWindow::show`] to
/// start tracking the store.
///
/// # Errors
///
/// Returns a [`DesktopError`] for invalid geometry or a failed allocation.
pub fn open_window(
    ctx: Arc<EngineContext>,
    source: Arc<dyn SnapshotSource>,
    options: WindowOptions,
) -> Result<DesktopWindow, DesktopError> {
    let (width, height) = backing_size(options.width, options.height, options.scale_factor)?;
    let config = SurfaceConfig { width, height, scale_factor: options.scale_factor };
    let surface = SurfaceAdapter::new(ctx, &config)?;

    let mut view = WindowView {
        title: options.title.clone(),
        appearance: Appearance::default(),
        background: None,
        updates: 0,
    };
    view.apply(&options.title, &source.snapshot());

    tracing::debug!(width, height, scale = options.scale_factor, "window opened");
    Ok(DesktopWindow {
        surface,
        source,
        size: (options.width, options.height),
        scale: options.scale_factor,
        options,
        view: Arc::new(Mutex::new(view)),
        subscription: None,
    })
}

impl DesktopWindow {
    /// Makes the window visible and starts following snapshot changes.
    ///
    /// # Errors
    ///
    /// Returns [`DesktopError::Closed`] after [`DesktopWindow::close`].
    pub fn show(&mut self) -> Result<(), DesktopError> {
        if self.surface.is_closed() {
            return Err(DesktopError::Closed);
        }
        if self.subscription.is_some() {
            return Ok(());
        }

        let view = Arc::clone(&self.view);
        let title = self.options.title.clone();
        self.subscription = Some(self.source.subscribe(Arc::new(move |snapshot: &Arc<Snapshot>| {
            view.lock().apply(&title, snapshot);
        })));

        // Catch up on anything published between open and show.
        self.view.lock().apply(&self.options.title, &self.source.snapshot());
        Ok(())
    }

    /// Resizes the window to a logical size at `scale_factor`.
    ///
    /// # Errors
    ///
    /// Returns a [`DesktopError`] for invalid geometry or a closed window.
    pub fn resize(&mut self, width: u32, height: u32, scale_factor: f64) -> Result<(), DesktopError> {
        let (backing_width, backing_height) = backing_size(width, height, scale_factor)?;
        self.surface.resize(backing_width, backing_height, scale_factor)?;

        self.size = (width, height);
        self.scale = scale_factor;
        Ok(())
    }

    /// Stops following the store and releases the surface and session.
    pub fn close(&mut self) {
        self.subscription = None;
        self.surface.close();
    }

    #[must_use]
    pub fn is_visible(&self) -> bool { self.subscription.is_some() && !self.surface.is_closed() }

    #[must_use]
    pub fn title(&self) -> String { self.view.lock().title.clone() }

    #[must_use]
    pub fn appearance(&self) -> Appearance { self.view.lock().appearance }

    #[must_use]
    pub fn background(&self) -> Option<Rgba> { self.view.lock().background }

    /// Returns how many snapshots the window has applied.
    #[must_use]
    pub fn updates(&self) -> u64 { self.view.lock().updates }

    /// Logical size in points.
    #[must_use]
    pub const fn size(&self) -> (u32, u32) { self.size }

    #[must_use]
    pub const fn scale_factor(&self) -> f64 { self.scale }

    #[must_use]
    pub const fn surface(&self) -> &SurfaceAdapter { &self.surface }
}
