//! Text console adapter.

use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;

use colored::Colorize;

use crate::store::{Rgba, Snapshot, SnapshotSource};

/// Width of the label column.
const LABEL_WIDTH: usize = 14;

/// ANSI sequence that clears the screen and homes the cursor.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

fn swatch(color: Rgba) -> String {
    "    ".on_truecolor(color.r(), color.g(), color.b()).to_string()
}

fn line(label: &str, value: impl std::fmt::Display) -> String {
    let label = format!("{label:<LABEL_WIDTH$}");
    format!("{}{value}", label.bold())
}

/// Renders a snapshot as display lines.
#[must_use]
pub fn render(snapshot: &Snapshot) -> Vec<String> {
    if !snapshot.ready {
        return vec!["loading...".dimmed().to_string()];
    }

    let mut lines = Vec::new();

    if let Some(settings) = &snapshot.settings {
        lines.push(line("scheme", settings.scheme));
        lines.push(line("light theme", &settings.light_theme));
        lines.push(line("dark theme", &settings.dark_theme));
    }

    if let Some(theme) = &snapshot.theme {
        lines.push(line("theme", theme.name.cyan()));
        for (name, color) in theme.colors() {
            lines.push(line(name, format_args!("{} {color}", swatch(color))));
        }
    }

    if let Some(error) = &snapshot.error {
        lines.push(line("error", error.red()));
    }

    lines
}

/// Writes a snapshot to `out`.
///
/// # Errors
///
/// Returns any error from `out`.
pub fn draw(out: &mut impl Write, snapshot: &Snapshot) -> io::Result<()> {
    for line in render(snapshot) {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// Live console view over a snapshot source.
pub struct ConsoleAdapter {
    source: Arc<dyn SnapshotSource>,
    clear: bool,
}

impl ConsoleAdapter {
    #[must_use]
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self { Self { source, clear: false } }

    /// Clears the screen before each frame.
    #[must_use]
    pub const fn clear_screen(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    fn frame(&self, out: &mut impl Write, snapshot: &Snapshot) -> io::Result<()> {
        if self.clear {
            write!(out, "{CLEAR_SCREEN}")?;
        }
        draw(out, snapshot)
    }

    /// Renders the current snapshot, then every new one, until `shutdown`
    /// resolves. Returns the number of frames drawn.
    ///
    /// # Errors
    ///
    /// Returns any error from `out`.
    pub async fn run(
        &self,
        mut out: impl Write,
        shutdown: impl Future<Output = ()>,
    ) -> io::Result<usize> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _subscription = self.source.subscribe(Arc::new(move |snapshot: &Arc<Snapshot>| {
            let _ = tx.send(Arc::clone(snapshot));
        }));

        let mut last = self.source.snapshot();
        self.frame(&mut out, &last)?;
        let mut frames = 1;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                next = rx.recv() => {
                    let Some(snapshot) = next else { break };
                    if Arc::ptr_eq(&snapshot, &last) {
                        continue;
                    }
                    self.frame(&mut out, &snapshot)?;
                    frames += 1;
                    last = snapshot;
                }
                () = &mut shutdown => break,
            }
        }

        Ok(frames)
    }
}
