use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::message::Inbound;
use crate::protocol::Envelope;

/// Outbound half of a client connection.
///
/// The session registry owns the only long-lived handle; everyone else sees
/// it through a snapshot. After `close` the handle must not be used again,
/// and `send` on a closed handle fails.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Deliver one envelope to this client.
    async fn send(&self, envelope: &Envelope) -> Result<(), RelayError>;

    /// Tear the connection down. Idempotent.
    fn close(&self);
}

/// Trait for long-running relay components fed from the inbound queue.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Human-readable name of this component.
    fn name(&self) -> &str;

    /// Start the component's event loop, consuming from the given receiver.
    async fn start(&self, rx: mpsc::Receiver<Inbound>) -> Result<()>;
}
