//! Integration tests for the store running on the embedded engine.
//!
//! Each test writes a settings directory into a temporary folder, starts a
//! [`Store`] over it and drives changes either explicitly through
//! [`EmbeddedEngine::refresh`] or through the file monitor.
//!
//! ## Running Integration Tests
//!
//! ```bash
//! cargo test -p ares --test store_integration -- --nocapture
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use ares_lib::adapters::desktop::{Appearance, WindowOptions, open_window};
use ares_lib::context::EngineContext;
use ares_lib::engine::HandleKind;
use ares_lib::engine::embedded::EmbeddedEngine;
use ares_lib::pump::DrainOutcome;
use ares_lib::store::{ColorScheme, SnapshotSource, Store, StoreOptions, StoreState};
use parking_lot::{Mutex, MutexGuard};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

/// The engine callback slot is process-wide, so only one store may run at a time.
fn exclusive() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock()
}

fn write(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

fn theme_json(fg: &str, bg: &str) -> String {
    format!(
        r##"{{ "fg": "{fg}", "bg": "{bg}", "primary_fg": "#268bd2",
             "primary_bg": "#073642", "muted_fg": "#586e75", "muted_bg": "#eee8d5",
             "scroll_thumb": "#93a1a1", "scroll_track": "#fdf6e3", "border": "#eee8d5" }}"##
    )
}

/// Waits until `condition` holds, draining the store between checks.
async fn wait_for(store: &Store, timeout: Duration, condition: impl Fn(&Store) -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        store.drain_now();
        if condition(store) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

// ============================================================================
// Fixture
// ============================================================================

/// A started store over a temporary settings directory.
struct Fixture {
    dir: TempDir,
    engine: Arc<EmbeddedEngine>,
    ctx: Arc<EngineContext>,
    store: Arc<Store>,
    _guard: MutexGuard<'static, ()>,
}

impl Fixture {
    /// Must be called inside a tokio runtime.
    fn start(settings: &str) -> Self { Self::start_with(settings, &[]) }

    /// Like [`Fixture::start`], writing `files` before the store starts.
    fn start_with(settings: &str, files: &[(&str, &str)]) -> Self {
        let guard = exclusive();
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "settings.jsonc", settings);
        for (name, contents) in files {
            write(dir.path(), name, contents);
        }

        let engine = Arc::new(EmbeddedEngine::new());
        let ctx = EngineContext::new(engine.clone());
        let store = Arc::new(Store::new(Arc::clone(&ctx), StoreOptions::new(dir.path())));
        store.start().unwrap();

        Self { dir, engine, ctx, store, _guard: guard }
    }

    fn path(&self) -> &Path { self.dir.path() }

    /// Applies file changes now and dispatches the resulting events.
    fn sync(&self) -> DrainOutcome {
        self.engine.refresh();
        self.store.drain_now()
    }

    fn scheme(&self) -> Option<ColorScheme> {
        self.store.snapshot().settings.as_ref().map(|settings| settings.scheme)
    }

    fn theme_name(&self) -> Option<String> {
        self.store.snapshot().theme.as_ref().map(|theme| theme.name.clone())
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.store.stop();
        self.ctx.shutdown();
    }
}

// ============================================================================
// Store Tests
// ============================================================================

#[tokio::test]
async fn test_start_publishes_initial_snapshot() {
    let fixture = Fixture::start(r#"{ "scheme": "light" }"#);

    let snapshot = fixture.store.snapshot();
    assert!(snapshot.ready);
    assert!(snapshot.error.is_none());
    assert_eq!(fixture.scheme(), Some(ColorScheme::Light));
    assert_eq!(fixture.theme_name().as_deref(), Some("solarized-light"));

    assert_eq!(fixture.engine.live_handles_of(HandleKind::Monitor), 1);
    assert_eq!(fixture.engine.live_handles_of(HandleKind::Settings), 1);
    assert!(fixture.engine.has_callback());
}

#[tokio::test]
async fn test_scheme_change_notifies_once() {
    let fixture = Fixture::start(r#"{ "scheme": "light" }"#);
    let notifications = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notifications);
    let _subscription = fixture.store.subscribe(Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let before = fixture.store.snapshot();

    write(fixture.path(), "settings.jsonc", r#"{ "scheme": "dark" }"#);
    fixture.sync();

    assert_eq!(notifications.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.scheme(), Some(ColorScheme::Dark));
    assert_eq!(fixture.theme_name().as_deref(), Some("solarized-dark"));
    assert!(!Arc::ptr_eq(&before, &fixture.store.snapshot()));

    // Nothing changed on disk, so nothing is published.
    let current = fixture.store.snapshot();
    fixture.sync();
    assert!(Arc::ptr_eq(&current, &fixture.store.snapshot()));
    assert_eq!(notifications.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_theme_file_change_replaces_theme() {
    let paper = theme_json("#111111", "#ffffff");
    let fixture = Fixture::start_with(
        r#"{ "scheme": "light", "light_theme": "paper" }"#,
        &[("themes/paper.json", paper.as_str())],
    );
    assert_eq!(fixture.theme_name().as_deref(), Some("paper"));
    let settings = fixture.store.snapshot().settings.clone();

    write(fixture.path(), "themes/paper.json", &theme_json("#222222", "#ffffff"));
    fixture.sync();

    let snapshot = fixture.store.snapshot();
    assert_eq!(snapshot.settings, settings);
    assert_eq!(snapshot.theme.as_ref().unwrap().fg.to_string(), "#222222");
}

#[tokio::test]
async fn test_invalid_settings_keep_previous_values() {
    let fixture = Fixture::start(r#"{ "scheme": "dark" }"#);

    write(fixture.path(), "settings.jsonc", "{ not json");
    fixture.sync();

    let snapshot = fixture.store.snapshot();
    assert!(snapshot.error.is_some());
    assert_eq!(fixture.scheme(), Some(ColorScheme::Dark));

    write(fixture.path(), "settings.jsonc", r#"{ "scheme": "light" }"#);
    fixture.sync();

    assert!(fixture.store.snapshot().error.is_none());
    assert_eq!(fixture.scheme(), Some(ColorScheme::Light));
}

#[tokio::test]
async fn test_monitor_picks_up_changes() {
    let fixture = Fixture::start(r#"{ "scheme": "light" }"#);

    write(fixture.path(), "settings.jsonc", r#"{ "scheme": "dark" }"#);

    let changed = wait_for(&fixture.store, Duration::from_secs(10), |store| {
        store.snapshot().settings.as_ref().is_some_and(|s| s.scheme == ColorScheme::Dark)
    })
    .await;
    assert!(changed, "monitor did not report the settings change");
}

#[tokio::test]
async fn test_stop_releases_engine_resources() {
    let fixture = Fixture::start(r#"{ "scheme": "light" }"#);

    fixture.store.stop();
    assert_eq!(fixture.store.state(), StoreState::Stopped);
    assert_eq!(fixture.engine.live_handles(), 0);
    assert!(!fixture.engine.has_callback());

    fixture.store.start().unwrap();
    assert_eq!(fixture.store.state(), StoreState::Active);
    assert_eq!(fixture.engine.live_handles(), 2);
    assert!(fixture.engine.has_callback());
}

// ============================================================================
// Desktop Window Tests
// ============================================================================

#[tokio::test]
async fn test_window_follows_store_and_releases_surface() {
    let fixture = Fixture::start(r#"{ "scheme": "light" }"#);
    let source: Arc<dyn SnapshotSource> = fixture.store.clone();

    let mut window =
        open_window(Arc::clone(&fixture.ctx), source, WindowOptions::default()).unwrap();
    window.show().unwrap();
    assert!(window.is_visible());
    assert_eq!(window.appearance(), Appearance::Light);
    assert_eq!(window.title(), "Ares (solarized-light)");

    write(fixture.path(), "settings.jsonc", r#"{ "scheme": "dark" }"#);
    fixture.sync();
    assert_eq!(window.appearance(), Appearance::Dark);
    assert_eq!(window.title(), "Ares (solarized-dark)");

    window.resize(1024, 768, 2.0).unwrap();
    let metrics = fixture
        .ctx
        .registry()
        .with_active(window.surface().surface(), |raw| fixture.engine.surface_metrics(raw))
        .unwrap()
        .unwrap();
    assert_eq!((metrics.width, metrics.height), (2048, 1536));
    assert!((metrics.x_scale - 2.0).abs() < f64::EPSILON);

    window.close();
    assert!(!window.is_visible());
    assert_eq!(fixture.engine.live_handles_of(HandleKind::Surface), 0);
    assert_eq!(fixture.engine.live_handles_of(HandleKind::Session), 0);
}
