//! Graceful interruption of a run.
//!
//! A [`ShutdownCoordinator`] is created once in `main`, handed to the run
//! loop, and flipped by the Ctrl+C handler. The loop checks the flag between
//! items and races the in-flight inference call against
//! [`ShutdownCoordinator::wait_for_shutdown`], so a long request never holds
//! the process past an interrupt. An interrupted item is simply left pending.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Stop flag shared between the signal handler and the run loop.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    is_shutdown: AtomicBool,
    notify: Notify,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new shared coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown. Wakes every waiter exactly once.
    pub fn request_shutdown(&self) {
        if !self.is_shutdown.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait_for_shutdown(&self) {
        // Register before checking the flag so a request in between is not missed
        let notified = self.notify.notified();
        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }

    /// Install a Ctrl+C handler that requests shutdown on this coordinator.
    ///
    /// Must be called from within a tokio runtime.
    pub fn install_ctrl_c_handler(self: &Arc<Self>) {
        let shutdown = Arc::clone(self);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - stopping, the current item stays pending");
                shutdown.request_shutdown();
            }
        });
    }
}
