use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Tracks whether the backend connection is ready to take calls.
///
/// Reads wait on the gate instead of failing while the connection is
/// still being established. Clones share the same state.
#[derive(Debug, Clone)]
pub struct ConnectionGate {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectionGate {
    /// A gate that starts closed
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// A gate that starts open
    pub fn ready() -> Self {
        let gate = Self::new();
        gate.set_ready(true);
        gate
    }

    pub fn set_ready(&self, ready: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == ready {
                false
            } else {
                *current = ready;
                true
            }
        });
        if changed {
            info!(ready, "Backend connection state changed");
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Suspend until the connection is ready
    pub async fn wait_ready(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for ConnectionGate {
    fn default() -> Self {
        Self::new()
    }
}
