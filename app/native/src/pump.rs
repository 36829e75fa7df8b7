//! Drain pump.
//!
//! A drain cycle asks the engine to flush its buffered events (which runs the
//! bridge callback synchronously) and then dispatches everything on the
//! pending queue, in order, to an [`EventHandler`]. Cycles run on demand via
//! [`DrainPump::drain_once`] or periodically on a tokio task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::context::EngineContext;
use crate::engine::EngineError;
use crate::events::DomainEvent;

/// Receives dispatched events.
pub trait EventHandler: Send + Sync {
    /// Handles one event. Called in queue order, one at a time.
    fn on_event(&self, event: DomainEvent);

    /// Called when the engine fails to flush its buffer.
    fn on_drain_error(&self, error: EngineError);
}

/// Result of a drain cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The cycle ran.
    Drained { dispatched: usize, flush_failed: bool },
    /// Another cycle was already in progress.
    Skipped,
}

/// Errors starting the periodic pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PumpError {
    #[error("drain interval must be greater than zero")]
    InvalidInterval,

    #[error("no tokio runtime available to run the drain pump")]
    NoRuntime,
}

/// Clears the drain flag when a cycle ends, including on unwind.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok().map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

struct Shared {
    ctx: Arc<EngineContext>,
    draining: AtomicBool,
}

impl Shared {
    fn drain_once(&self, handler: &dyn EventHandler) -> DrainOutcome {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            tracing::trace!("drain already in progress, skipping");
            return DrainOutcome::Skipped;
        };

        let flush_failed = match self.ctx.engine().drain_events() {
            Ok(()) => false,
            Err(err) => {
                tracing::warn!(error = %err, "engine flush failed");
                handler.on_drain_error(err);
                true
            }
        };

        let events = self.ctx.bridge().take_pending();
        let dispatched = events.len();
        for event in events {
            tracing::trace!(%event, "dispatching event");
            handler.on_event(event);
        }

        DrainOutcome::Drained { dispatched, flush_failed }
    }
}

/// Runs drain cycles against an [`EngineContext`].
pub struct DrainPump {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DrainPump {
    #[must_use]
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            shared: Arc::new(Shared { ctx, draining: AtomicBool::new(false) }),
            task: Mutex::new(None),
        }
    }

    /// Runs one flush-then-dispatch cycle on the calling thread.
    ///
    /// Returns [`DrainOutcome::Skipped`] if a cycle is already running,
    /// including when called from inside `handler`.
    pub fn drain_once(&self, handler: &dyn EventHandler) -> DrainOutcome {
        self.shared.drain_once(handler)
    }

    /// Starts periodic drain cycles on the current tokio runtime.
    ///
    /// The handler is held weakly; the task ends once it is dropped. Starting
    /// a running pump does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PumpError::InvalidInterval`] for a zero interval and
    /// [`PumpError::NoRuntime`] outside a tokio runtime.
    pub fn start(&self, interval: Duration, handler: Weak<dyn EventHandler>) -> Result<(), PumpError> {
        if interval.is_zero() {
            return Err(PumpError::InvalidInterval);
        }

        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|running| !running.is_finished()) {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|_| PumpError::NoRuntime)?;
        let shared = Arc::clone(&self.shared);

        *task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let Some(handler) = handler.upgrade() else {
                    break;
                };
                shared.drain_once(handler.as_ref());
            }

            tracing::trace!("drain pump handler dropped, stopping");
        }));

        tracing::debug!(?interval, "drain pump started");
        Ok(())
    }

    /// Stops periodic draining. No-op when not running.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::debug!("drain pump stopped");
        }
    }

    /// Returns whether the periodic task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for DrainPump {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
