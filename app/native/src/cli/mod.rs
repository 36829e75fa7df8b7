//! CLI module for Ares.
//!
//! This module provides the command-line interface: a live console view of
//! the settings store, one-shot snapshots and tooling helpers.

mod commands;
mod output;

use clap::Parser;
pub use commands::{Cli, Commands};

use crate::error::AresError;

/// Runs the CLI.
///
/// Parses command-line arguments and executes the appropriate command.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn run() -> Result<(), AresError> {
    let cli = Cli::parse();
    cli.execute()
}
