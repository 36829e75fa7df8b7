//! Platform helpers shared by the engine and the CLI.
//!
//! - [`path`] - tilde expansion and config-relative path resolution
//! - [`thread`] - named background threads

pub mod path;
pub mod thread;

pub use thread::spawn_named_thread;
