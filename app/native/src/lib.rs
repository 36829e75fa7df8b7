//! Ares - engine bindings, event pump and reactive state store.
//!
//! The engine owns settings, themes and terminal surfaces behind opaque
//! handles and reports changes through a single C callback. This library
//! wraps it in a handle registry, a callback bridge and a drain pump, and
//! exposes the result as an observable [`store::Store`] of immutable
//! snapshots for the console and desktop front ends.

// Engine plumbing
pub mod bridge;
pub mod context;
pub mod engine;
pub mod events;
pub mod pump;
pub mod registry;

// State
pub mod store;

// Front ends and tooling
pub mod adapters;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod platform;
