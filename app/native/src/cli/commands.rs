//! CLI command definitions using Clap.
//!
//! This module defines all CLI commands and their arguments.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Generator, Shell, generate};
use colored::Colorize;

use super::output;
use crate::adapters::console::ConsoleAdapter;
use crate::config::{self, LoadedConfig};
use crate::constants::APP_VERSION;
use crate::context::EngineContext;
use crate::engine::Engine;
use crate::error::AresError;
use crate::logging;
use crate::store::{SnapshotSource, Store};

/// Ares CLI - inspect and watch terminal settings and themes.
#[derive(Parser, Debug)]
#[command(name = "ares")]
#[command(author, version = APP_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a configuration file.
    #[arg(long, short, global = true, env = "ARES_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Settings directory or file, overriding the configuration.
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum Commands {
    /// Show live settings and theme, redrawing on every change.
    ///
    /// Runs until interrupted with Ctrl+C.
    Watch {
        /// Clear the screen before each redraw.
        #[arg(long)]
        clear: bool,
    },

    /// Print the current settings and theme once.
    Snapshot {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Output Ares configuration JSON Schema.
    ///
    /// Outputs a JSON Schema to stdout that describes the structure of the
    /// Ares configuration file. Can be redirected to a file for use with
    /// editors that support JSON Schema validation.
    Schema,

    /// Generate shell completions.
    ///
    /// Outputs shell completion script to stdout for the specified shell.
    /// Can be used with eval or redirected to a file.
    ///
    /// Usage:
    ///   eval "$(ares completions --shell zsh)"
    ///   ares completions --shell bash > ~/.local/share/bash-completion/completions/ares
    ///   ares completions --shell fish > ~/.config/fish/completions/ares.fish
    Completions {
        /// The shell to generate completions for.
        #[arg(long, short, value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command execution fails.
    pub fn execute(&self) -> Result<(), AresError> {
        match &self.command {
            Commands::Schema => {
                println!("{}", config::generate_schema_json());
                Ok(())
            }
            Commands::Completions { shell } => {
                Self::print_completions(*shell);
                Ok(())
            }
            Commands::Watch { clear } => {
                let loaded = self.load_config();
                block_on(self.execute_watch(&loaded, *clear))
            }
            Commands::Snapshot { json } => {
                let loaded = self.load_config();
                block_on(async { self.execute_snapshot(&loaded, *json) })
            }
        }
    }

    /// Print shell completions to stdout.
    fn print_completions<G: Generator>(generator: G) {
        let mut cmd = Self::command();
        generate(generator, &mut cmd, "ares", &mut io::stdout());
    }

    /// Loads configuration and initializes logging from it.
    fn load_config(&self) -> LoadedConfig {
        let loaded = config::load(self.config.as_deref());
        logging::init(loaded.config.log_level.as_deref());
        if let Some(path) = &loaded.path {
            tracing::debug!(path = %path.display(), "loaded configuration");
        }
        loaded
    }

    /// Creates an engine context and a store over the configured settings.
    fn open_store(&self, loaded: &LoadedConfig) -> (Arc<EngineContext>, Arc<Store>) {
        let ctx = EngineContext::new(engine());
        let store = Store::new(Arc::clone(&ctx), loaded.store_options(self.settings.as_deref()));
        (ctx, Arc::new(store))
    }

    /// Execute the watch command.
    async fn execute_watch(&self, loaded: &LoadedConfig, clear: bool) -> Result<(), AresError> {
        let (ctx, store) = self.open_store(loaded);
        let source: Arc<dyn SnapshotSource> = store.clone();

        let frames = ConsoleAdapter::new(source)
            .clear_screen(clear)
            .run(io::stdout(), ctrl_c())
            .await;

        store.stop();
        ctx.shutdown();

        let frames = frames?;
        tracing::debug!(frames, "watch finished");
        Ok(())
    }

    /// Execute the snapshot command.
    fn execute_snapshot(&self, loaded: &LoadedConfig, json: bool) -> Result<(), AresError> {
        let (ctx, store) = self.open_store(loaded);
        let started = store.start();
        let snapshot = store.snapshot();

        store.stop();
        ctx.shutdown();
        started?;

        if json {
            output::print_json(&*snapshot)?;
        } else {
            if let Some(source) = &self.settings {
                println!("{}", format!("Settings ({})", source.display()).bold());
            }
            println!("{}", output::snapshot_table(&snapshot));
        }

        match (&snapshot.settings, &snapshot.error) {
            (None, Some(error)) => Err(AresError::EngineError(error.clone())),
            _ => Ok(()),
        }
    }
}

/// Returns the engine this binary was built for.
#[cfg(feature = "native")]
fn engine() -> Arc<dyn Engine> { Arc::new(crate::engine::native::NativeEngine::new()) }

/// Returns the engine this binary was built for.
#[cfg(not(feature = "native"))]
fn engine() -> Arc<dyn Engine> { Arc::new(crate::engine::embedded::EmbeddedEngine::new()) }

/// Runs `future` to completion on a single-threaded runtime.
fn block_on<T>(future: impl Future<Output = Result<T, AresError>>) -> Result<T, AresError> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(future)
}

/// Resolves on Ctrl+C.
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
