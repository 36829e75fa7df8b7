//! Presentation front ends.
//!
//! Adapters only see the store through [`SnapshotSource`](crate::store::SnapshotSource)
//! and, for the desktop window, the engine context needed to own a surface.
//!
//! - [`console`] - renders snapshots as text with true-color swatches
//! - [`desktop`] - a window backed by an engine session and surface

pub mod console;
pub mod desktop;
