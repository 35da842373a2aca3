use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::message::Inbound;

/// Default inbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// The single FIFO between connection handlers and the dispatcher.
///
/// Handlers clone `inbound_tx`; the receiver is taken once by the dispatcher.
/// The queue is bounded, so a full queue makes the producing handler wait.
pub struct RelayBus {
    pub inbound_tx: mpsc::Sender<Inbound>,
    pub inbound_rx: Option<mpsc::Receiver<Inbound>>,
}

impl RelayBus {
    /// Create a new bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a new bus with a custom capacity (clamped to at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);

        info!(capacity, "RelayBus initialized");

        Self {
            inbound_tx,
            inbound_rx: Some(inbound_rx),
        }
    }

    /// Take the inbound receiver (can only be called once).
    pub fn take_inbound_rx(&mut self) -> Option<mpsc::Receiver<Inbound>> {
        debug!("Inbound receiver taken");
        self.inbound_rx.take()
    }
}

impl Default for RelayBus {
    fn default() -> Self {
        Self::new()
    }
}
