//! Consumer-facing snapshot interface.

use std::fmt;
use std::sync::Arc;

use super::types::Snapshot;

/// Callback invoked with every newly published snapshot.
pub type Listener = Arc<dyn Fn(&Arc<Snapshot>) + Send + Sync>;

/// Anything adapters can render from.
pub trait SnapshotSource: Send + Sync {
    /// Returns the current snapshot without touching the engine.
    fn snapshot(&self) -> Arc<Snapshot>;

    /// Registers a listener, called in subscription order on every change.
    fn subscribe(&self, listener: Listener) -> Subscription;

    /// Returns an async stream of snapshots. Intermediate values may be skipped.
    fn watch(&self) -> eyeball::Subscriber<Arc<Snapshot>>;
}

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a subscription that runs `cancel` when released.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// Removes the listener now.
    pub fn unsubscribe(self) { drop(self); }

    /// Keeps the listener registered for the lifetime of the source.
    pub fn detach(mut self) { self.cancel = None; }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("active", &self.cancel.is_some()).finish()
    }
}
