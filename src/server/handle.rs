//! Lifecycle state and the cloneable control handle.

use tokio::sync::{broadcast, watch};

/// Lifecycle state of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Built but not yet serving.
    Created,
    /// Accept loop running.
    Serving,
    /// Shutdown signalled; accept loop exiting.
    ShuttingDown,
    /// Accept loop exited and the socket released.
    Stopped,
}

/// Control surface for a running server.
///
/// Handles are cheap to clone and valid from any task. Shutdown is
/// idempotent: signalling an already-stopped server is a no-op.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    shutdown_tx: broadcast::Sender<()>,
    state_rx: watch::Receiver<ServerState>,
}

impl ServerHandle {
    pub(crate) fn new(
        shutdown_tx: broadcast::Sender<()>,
        state_rx: watch::Receiver<ServerState>,
    ) -> Self {
        Self { shutdown_tx, state_rx }
    }

    /// Signal the serving loop to stop accepting and return.
    pub fn shutdown(&self) {
        // No receivers just means the loop already exited.
        let _ = self.shutdown_tx.send(());
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.state_rx.borrow()
    }

    /// Wait until the serving loop has fully exited.
    pub async fn wait_stopped(&self) {
        let mut rx = self.state_rx.clone();
        loop {
            if *rx.borrow_and_update() == ServerState::Stopped {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone: the server was dropped without serving.
                return;
            }
        }
    }
}
