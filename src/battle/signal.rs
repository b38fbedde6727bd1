//! One-shot cancellation flag shared between a room and its game task.

use std::sync::Arc;
use tokio::sync::watch;

/// Idempotent stop signal.
///
/// Clones observe the same flag. Once stopped it never resets; a new game
/// gets a new signal.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    /// Create an unstopped signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the flag. Calling this more than once is a no-op.
    pub fn stop(&self) {
        self.tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });
    }

    /// Check the flag without waiting.
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the flag is raised.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once stopped.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Whether both handles refer to the same signal.
    pub fn same_as(&self, other: &StopSignal) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
