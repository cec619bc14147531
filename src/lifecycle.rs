//! 生命周期控制 (cancellation)
//!
//! One [`CancellationToken`] is created per run and cloned into every worker,
//! the coordinator and the sink. Cancelling sets the flag and drops the only
//! sender of the wake-up channel, so every `select!` that includes
//! [`CancellationToken::receiver`] returns immediately.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    wake_tx: Mutex<Option<Sender<()>>>,
    wake_rx: Receiver<()>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                wake_tx: Mutex::new(Some(wake_tx)),
                wake_rx,
            }),
        }
    }

    /// Idempotent. Returns true only for the call that actually cancelled.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::SeqCst);
        // Dropping the sender disconnects every receiver clone.
        let mut guard = match self.inner.wake_tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Channel that never yields a message and becomes ready (disconnected)
    /// once the token is cancelled. Use it as an arm of `select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.inner.wake_rx
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// SIGINT / SIGTERM 触发取消
pub fn install_signal_handler(token: &CancellationToken) -> Result<(), ctrlc::Error> {
    let token = token.clone();
    ctrlc::set_handler(move || {
        if token.cancel() {
            info!("🛑 termination signal received, stopping cameras...");
        } else {
            warn!("🛑 termination signal received again, shutdown already in progress");
        }
    })
}
