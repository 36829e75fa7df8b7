//! Engine context.
//!
//! One [`EngineContext`] is built at process start and shared by `Arc` with
//! every component that talks to the engine. It owns the engine client, the
//! handle registry and the callback bridge.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bridge::EventBridge;
use crate::engine::Engine;
use crate::registry::HandleRegistry;

/// Engine client plus the state built around it.
pub struct EngineContext {
    engine: Arc<dyn Engine>,
    registry: HandleRegistry,
    bridge: EventBridge,
    deinitialized: AtomicBool,
}

impl EngineContext {
    /// Creates a context for `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>) -> Arc<Self> {
        Arc::new(Self {
            registry: HandleRegistry::new(Arc::clone(&engine)),
            bridge: EventBridge::new(Arc::clone(&engine)),
            engine,
            deinitialized: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<dyn Engine> { &self.engine }

    #[must_use]
    pub const fn registry(&self) -> &HandleRegistry { &self.registry }

    #[must_use]
    pub const fn bridge(&self) -> &EventBridge { &self.bridge }

    /// Returns whether [`EngineContext::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool { self.deinitialized.load(Ordering::Acquire) }

    /// Uninstalls the callback, releases every live handle and deinitializes
    /// the engine. Runs once; later calls do nothing.
    pub fn shutdown(&self) {
        if self.deinitialized.swap(true, Ordering::AcqRel) {
            return;
        }

        self.bridge.uninstall();
        let released = self.registry.release_all();
        if released > 0 {
            tracing::debug!(released, "released handles at shutdown");
        }

        self.engine.deinit();
        tracing::info!("engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::test_lock;
    use crate::engine::HandleKind;
    use crate::engine::mock::MockEngine;

    #[test]
    fn shutdown_runs_once() {
        let _guard = test_lock();
        let engine = Arc::new(MockEngine::new());
        let ctx = EngineContext::new(engine.clone());

        ctx.bridge().install().unwrap();
        ctx.registry().create(HandleKind::Monitor).unwrap();
        ctx.registry().create(HandleKind::Settings).unwrap();

        ctx.shutdown();
        ctx.shutdown();

        assert!(ctx.is_shut_down());
        assert_eq!(engine.deinits(), 1);
        assert_eq!(engine.live(), 0);
        assert!(!ctx.bridge().is_installed());
    }
}
