//! Engine callback bridge.
//!
//! The engine reports events through a single C function pointer that
//! carries no user data. [`handle_native_event`] is that function: it decodes
//! the raw triple into a [`DomainEvent`] and pushes it onto the pending queue
//! of the currently installed [`EventBridge`]. Nothing is dispatched from the
//! callback itself; the drain pump takes the queue later on its own thread.
//!
//! # Process-wide Slot
//!
//! Because the callback ABI has no context pointer, the route from the
//! callback to a bridge is a process-wide slot. Only one bridge can hold it
//! at a time; installing a second one fails with
//! [`CallbackRegistrationError::AlreadyInstalled`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::constants::PENDING_EVENT_CAPACITY;
use crate::engine::{CallbackToken, Engine};
use crate::events::DomainEvent;

// ============================================================================
// Global Sink Slot
// ============================================================================

/// Sink of the installed bridge, read by the native callback.
static ACTIVE_SINK: OnceLock<RwLock<Option<Arc<BridgeSink>>>> = OnceLock::new();

fn active_sink() -> &'static RwLock<Option<Arc<BridgeSink>>> {
    ACTIVE_SINK.get_or_init(|| RwLock::new(None))
}

/// Write side of a bridge's pending queue.
struct BridgeSink {
    bridge_id: Uuid,
    sender: mpsc::Sender<DomainEvent>,
    dropped: AtomicU64,
}

impl BridgeSink {
    fn push(&self, event: DomainEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(%event, dropped, "pending event queue full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                tracing::debug!(%event, "bridge closed, dropping event");
            }
        }
    }
}

// ============================================================================
// Native Callback
// ============================================================================

/// The callback registered with the engine.
///
/// May run on any thread. The payload is only read during this call.
///
/// # Safety
///
/// `payload` must be null or point to `len` readable bytes for the duration
/// of the call.
pub unsafe extern "C" fn handle_native_event(tag: u8, payload: *const u8, len: u64) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let bytes = match usize::try_from(len) {
            Ok(len) if !payload.is_null() && len > 0 => {
                Some(unsafe { std::slice::from_raw_parts(payload, len) })
            }
            _ => None,
        };
        route_event(tag, bytes);
    }));

    if result.is_err() {
        tracing::error!(tag, "panic while handling native event");
    }
}

fn route_event(tag: u8, payload: Option<&[u8]>) {
    let Some(event) = DomainEvent::decode(tag, payload) else {
        tracing::trace!(tag, "dropping event with unknown tag");
        return;
    };

    let sink = active_sink().read().clone();
    match sink {
        Some(sink) => sink.push(event),
        None => tracing::trace!(%event, "no bridge installed, dropping event"),
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// Errors from callback registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CallbackRegistrationError {
    /// The engine refused the callback.
    #[error("engine rejected the event callback")]
    Rejected,

    /// Another bridge already owns the process callback slot.
    #[error("another event bridge is already installed")]
    AlreadyInstalled,
}

/// Owns the callback registration and the pending event queue.
pub struct EventBridge {
    id: Uuid,
    engine: Arc<dyn Engine>,
    sink: Arc<BridgeSink>,
    receiver: Mutex<mpsc::Receiver<DomainEvent>>,
    token: Mutex<Option<CallbackToken>>,
}

impl EventBridge {
    /// Creates an uninstalled bridge with an empty queue.
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        let (sender, receiver) = mpsc::channel(PENDING_EVENT_CAPACITY);
        let id = Uuid::now_v7();

        Self {
            id,
            engine,
            sink: Arc::new(BridgeSink { bridge_id: id, sender, dropped: AtomicU64::new(0) }),
            receiver: Mutex::new(receiver),
            token: Mutex::new(None),
        }
    }

    /// Registers the callback with the engine and claims the process slot.
    ///
    /// Installing an already installed bridge returns its current token.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackRegistrationError::AlreadyInstalled`] if another
    /// bridge holds the slot and [`CallbackRegistrationError::Rejected`] if
    /// the engine returns a null token.
    pub fn install(&self) -> Result<CallbackToken, CallbackRegistrationError> {
        let mut token = self.token.lock();
        if let Some(existing) = *token {
            return Ok(existing);
        }

        {
            let mut slot = active_sink().write();
            if slot.as_ref().is_some_and(|active| active.bridge_id != self.id) {
                return Err(CallbackRegistrationError::AlreadyInstalled);
            }
            *slot = Some(Arc::clone(&self.sink));
        }

        // The slot lock is released first: the engine may call back while
        // registering.
        let Some(installed) = self.engine.install_callback(handle_native_event) else {
            self.release_slot();
            tracing::warn!(bridge = %self.id, "engine rejected the event callback");
            return Err(CallbackRegistrationError::Rejected);
        };

        *token = Some(installed);
        tracing::debug!(bridge = %self.id, token = ?installed, "event callback installed");
        Ok(installed)
    }

    /// Unregisters the callback and releases the process slot. No-op when not installed.
    pub fn uninstall(&self) {
        let Some(token) = self.token.lock().take() else {
            return;
        };

        self.engine.uninstall_callback(token);
        self.release_slot();
        tracing::debug!(bridge = %self.id, "event callback uninstalled");
    }

    fn release_slot(&self) {
        let mut slot = active_sink().write();
        if slot.as_ref().is_some_and(|active| active.bridge_id == self.id) {
            *slot = None;
        }
    }

    /// Takes every queued event, in the order the engine reported them.
    pub fn take_pending(&self) -> Vec<DomainEvent> {
        let mut receiver = self.receiver.lock();
        let mut events = Vec::with_capacity(receiver.len());
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Discards every queued event. Returns how many were dropped.
    pub fn discard_pending(&self) -> usize { self.take_pending().len() }

    /// Returns whether the callback is currently installed.
    #[must_use]
    pub fn is_installed(&self) -> bool { self.token.lock().is_some() }

    /// Returns the number of events dropped because the queue was full.
    #[must_use]
    pub fn dropped_count(&self) -> u64 { self.sink.dropped.load(Ordering::Relaxed) }

    /// Returns the engine this bridge is registered with.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn Engine> { &self.engine }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        if self.is_installed() {
            tracing::warn!(bridge = %self.id, "event bridge dropped while installed");
            self.uninstall();
        }
    }
}

/// Serializes tests that claim the process callback slot.
#[cfg(test)]
pub(crate) fn test_lock() -> parking_lot::MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock()
}
