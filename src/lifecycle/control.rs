//! Control channel for the watch loop.
//!
//! Reload requests and the shutdown request travel over one broadcast
//! channel, so every subscriber sees them in the order they were made.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::signals::{SignalEvent, Signals};

const CAPACITY: usize = 16;

/// Fan-out of [`SignalEvent`]s to long-running tasks.
///
/// Once shutdown has been requested, further reloads are ignored and a
/// second shutdown is a no-op.
pub struct Control {
    tx: broadcast::Sender<SignalEvent>,
    stopping: AtomicBool,
}

impl Control {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self {
            tx,
            stopping: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SignalEvent> {
        self.tx.subscribe()
    }

    /// Ask subscribers to re-read their configuration.
    ///
    /// Returns `false` if nobody received the request.
    pub fn request_reload(&self) -> bool {
        if self.is_stopping() {
            tracing::debug!("Reload ignored during shutdown");
            return false;
        }
        self.tx.send(SignalEvent::Reload).is_ok()
    }

    /// Ask subscribers to leave their loops.
    pub fn shutdown(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.tx.send(SignalEvent::Shutdown).is_ok() {
            tracing::info!(subscribers = self.tx.receiver_count(), "Shutdown triggered");
        }
    }

    pub fn dispatch(&self, event: SignalEvent) {
        match event {
            SignalEvent::Reload => {
                self.request_reload();
            }
            SignalEvent::Shutdown => self.shutdown(),
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Feed OS signals into this channel until shutdown.
    pub fn forward(self: Arc<Self>, mut signals: Signals) -> JoinHandle<()> {
        tokio::spawn(async move {
            while !self.is_stopping() {
                let event = signals.next().await;
                tracing::debug!(event = ?event, "Signal received");
                self.dispatch(event);
            }
        })
    }
}

impl Default for Control {
    fn default() -> Self {
        Self::new()
    }
}
