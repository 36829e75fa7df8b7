//! Lifecycle tracking for engine handles.
//!
//! Every engine allocation goes through the [`HandleRegistry`]. Consumers
//! hold a [`Handle`] key; the raw address stays inside the registry and is
//! only lent out through [`HandleRegistry::with_active`].
//!
//! # Lifecycle
//!
//! ```text
//! Created ──activate──▶ Active ──destroy──▶ Destroyed
//! ```
//!
//! The transition to `Destroyed` happens once, under the entry's write lock,
//! and is the only path that forwards a destroy to the engine. Later destroy
//! requests are absorbed and logged. Destroyed entries are kept as
//! tombstones so stale keys are reported as such instead of as unknown.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::engine::{Engine, HandleKind, RawHandle, SurfaceConfig};

// ============================================================================
// Types
// ============================================================================

/// Registry-assigned handle identifier (`UUIDv7`, so ids sort by creation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HandleId(Uuid);

impl HandleId {
    fn new() -> Self { Self(Uuid::now_v7()) }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// Key for a registered engine resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Handle {
    id: HandleId,
    kind: HandleKind,
}

impl Handle {
    #[must_use]
    pub const fn id(&self) -> HandleId { self.id }

    #[must_use]
    pub const fn kind(&self) -> HandleKind { self.kind }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Lifecycle state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleState {
    Created,
    Active,
    Destroyed,
}

/// Result of a destroy request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// The handle was live and the engine resource has been released.
    Destroyed,
    /// The handle had already been destroyed; the engine was not called.
    AlreadyDestroyed,
    /// The registry has never seen this handle.
    Unknown,
}

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The engine returned null for an allocation.
    #[error("engine failed to create {0} handle")]
    Initialization(HandleKind),

    /// The handle has been destroyed.
    #[error("handle {0} has been destroyed")]
    Destroyed(HandleId),

    /// The handle is not registered.
    #[error("unknown handle {0}")]
    Unknown(HandleId),

    /// Surfaces are created through `create_surface` with a parent session.
    #[error("surface handles require a parent session")]
    ParentRequired,

    /// A handle of the wrong kind was supplied.
    #[error("expected {expected} handle, found {found}")]
    KindMismatch { expected: HandleKind, found: HandleKind },
}

struct Slot {
    raw: RawHandle,
    state: HandleState,
}

type Entry = Arc<RwLock<Slot>>;

// ============================================================================
// Registry
// ============================================================================

/// Owns every engine handle and guarantees at-most-once destruction.
pub struct HandleRegistry {
    engine: Arc<dyn Engine>,
    entries: DashMap<Handle, Entry>,
}

impl HandleRegistry {
    /// Creates an empty registry forwarding to `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>) -> Self { Self { engine, entries: DashMap::new() } }

    /// Allocates a resource of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ParentRequired`] for surfaces and
    /// [`RegistryError::Initialization`] when the engine returns null.
    pub fn create(&self, kind: HandleKind) -> Result<Handle, RegistryError> {
        if kind == HandleKind::Surface {
            return Err(RegistryError::ParentRequired);
        }

        let raw = self.engine.create(kind).ok_or(RegistryError::Initialization(kind))?;
        Ok(self.register(kind, raw))
    }

    /// Allocates a surface owned by `session`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::KindMismatch`] if `session` is not a session,
    /// [`RegistryError::Destroyed`] if it is no longer live and
    /// [`RegistryError::Initialization`] when the engine returns null.
    pub fn create_surface(
        &self,
        session: Handle,
        config: &SurfaceConfig,
    ) -> Result<Handle, RegistryError> {
        if session.kind != HandleKind::Session {
            return Err(RegistryError::KindMismatch {
                expected: HandleKind::Session,
                found: session.kind,
            });
        }

        let raw = self
            .with_active(session, |raw| self.engine.create_surface(raw, config))?
            .ok_or(RegistryError::Initialization(HandleKind::Surface))?;
        Ok(self.register(HandleKind::Surface, raw))
    }

    fn register(&self, kind: HandleKind, raw: RawHandle) -> Handle {
        let handle = Handle { id: HandleId::new(), kind };
        let slot = Slot { raw, state: HandleState::Created };
        self.entries.insert(handle, Arc::new(RwLock::new(slot)));

        self.activate(handle);
        tracing::debug!(%handle, raw = ?raw, "handle created");
        handle
    }

    fn activate(&self, handle: Handle) {
        if let Some(entry) = self.entry(handle) {
            let mut slot = entry.write();
            if slot.state == HandleState::Created {
                slot.state = HandleState::Active;
            }
        }
    }

    fn entry(&self, handle: Handle) -> Option<Entry> {
        self.entries.get(&handle).map(|entry| Arc::clone(entry.value()))
    }

    /// Releases a handle.
    ///
    /// The first call forwards exactly one destroy to the engine. Concurrent
    /// and later calls return [`DestroyOutcome::AlreadyDestroyed`] without
    /// touching the engine.
    pub fn destroy(&self, handle: Handle) -> DestroyOutcome {
        let Some(entry) = self.entry(handle) else {
            tracing::warn!(%handle, "destroy requested for unknown handle");
            return DestroyOutcome::Unknown;
        };

        let mut slot = entry.write();
        if slot.state == HandleState::Destroyed {
            drop(slot);
            tracing::warn!(%handle, "ignoring double destroy");
            return DestroyOutcome::AlreadyDestroyed;
        }

        // The write lock is held across the engine call so in-flight
        // `with_active` readers finish first and new ones see `Destroyed`.
        self.engine.destroy(handle.kind, slot.raw);
        slot.state = HandleState::Destroyed;
        drop(slot);

        tracing::debug!(%handle, "handle destroyed");
        DestroyOutcome::Destroyed
    }

    /// Runs `f` with the raw address of a live handle.
    ///
    /// The entry's read lock is held while `f` runs, so the handle cannot be
    /// destroyed underneath it. `f` must not destroy the same handle.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Destroyed`] or [`RegistryError::Unknown`].
    pub fn with_active<T>(
        &self,
        handle: Handle,
        f: impl FnOnce(RawHandle) -> T,
    ) -> Result<T, RegistryError> {
        let entry = self.entry(handle).ok_or(RegistryError::Unknown(handle.id))?;
        let slot = entry.read();

        match slot.state {
            HandleState::Destroyed => Err(RegistryError::Destroyed(handle.id)),
            HandleState::Created | HandleState::Active => Ok(f(slot.raw)),
        }
    }

    /// Returns the lifecycle state of a handle.
    #[must_use]
    pub fn state(&self, handle: Handle) -> Option<HandleState> {
        self.entry(handle).map(|entry| entry.read().state)
    }

    /// Returns whether a handle is live.
    #[must_use]
    pub fn is_active(&self, handle: Handle) -> bool {
        self.state(handle) == Some(HandleState::Active)
    }

    /// Returns the number of handles not yet destroyed.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.value().read().state != HandleState::Destroyed).count()
    }

    /// Destroys every live handle, dependents first. Returns how many were released.
    pub fn release_all(&self) -> usize {
        let mut live: Vec<Handle> = self
            .entries
            .iter()
            .filter(|entry| entry.value().read().state != HandleState::Destroyed)
            .map(|entry| *entry.key())
            .collect();

        let order = HandleKind::teardown_order();
        live.sort_by_key(|handle| {
            (order.iter().position(|kind| *kind == handle.kind).unwrap_or(order.len()), handle.id)
        });

        live.into_iter().filter(|handle| self.destroy(*handle) == DestroyOutcome::Destroyed).count()
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry").field("live", &self.live_count()).finish_non_exhaustive()
    }
}
