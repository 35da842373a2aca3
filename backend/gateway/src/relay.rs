//! Connection handling and the relay's boundary operations.
//!
//! One [`Relay::serve_connection`] loop runs per client. It records key
//! announcements in the registry, sends the announcing client a catch-up of
//! every other known key, and feeds everything into the dispatcher queue.

use futures::{Stream, StreamExt};
use keyrelay_core::{Envelope, Inbound, RelayError, SessionId};
use keyrelay_logging::{EventLogger, RelayEvent, fingerprint, redact_sensitive_data};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::session_registry::{ConnectionHandle, KeyBinding, SessionRegistry};

/// Entry point used by transports.
#[derive(Clone)]
pub struct Relay {
    registry: SessionRegistry,
    inbound_tx: mpsc::Sender<Inbound>,
}

impl Relay {
    pub fn new(registry: SessionRegistry, inbound_tx: mpsc::Sender<Inbound>) -> Self {
        Self {
            registry,
            inbound_tx,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Register a freshly accepted connection.
    pub async fn accept_connection(&self, handle: ConnectionHandle) -> SessionId {
        let id = self.registry.add(handle).await;
        EventLogger::log_event(&id.to_string(), RelayEvent::SessionOpened);
        id
    }

    /// Handle one decoded envelope from `id`.
    ///
    /// For a key announcement the key is stored and the catch-up is sent
    /// before the broadcast is queued, so the announcer never sees its own
    /// key come back and never misses a key that was already known.
    pub async fn on_event_received(
        &self,
        id: SessionId,
        envelope: Envelope,
    ) -> Result<(), RelayError> {
        let envelope = match envelope {
            Envelope::KeyAnnouncement { sender_public_key } => {
                let key = match self.registry.set_public_key(id, &sender_public_key).await {
                    KeyBinding::Bound => sender_public_key,
                    KeyBinding::AlreadyBound(existing) => {
                        if existing != sender_public_key {
                            warn!(
                                session = %id,
                                kept = %fingerprint(&existing),
                                ignored = %fingerprint(&sender_public_key),
                                "Session already announced a different key"
                            );
                        }
                        existing
                    }
                    KeyBinding::UnknownSession => {
                        debug!(session = %id, "Key announcement from closed session dropped");
                        return Ok(());
                    }
                };

                let catch_up = self.catch_up(id).await;
                EventLogger::log_event(
                    &id.to_string(),
                    RelayEvent::KeyAnnounced {
                        key: key.clone(),
                        catch_up,
                    },
                );
                Envelope::announce(key)
            }
            other => other,
        };

        self.inbound_tx
            .send(Inbound::new(id, envelope))
            .await
            .map_err(|_| RelayError::QueueClosed)
    }

    /// Tear a session down. Safe to call any number of times.
    pub async fn on_connection_closed(&self, id: SessionId) {
        self.close_session(id, "connection closed").await;
    }

    /// Read loop for an accepted connection. Returns once the connection is
    /// gone; the session has been removed by then.
    pub async fn serve_connection<S>(&self, id: SessionId, inbound: S)
    where
        S: Stream<Item = Result<Envelope, RelayError>> + Send,
    {
        let mut inbound = std::pin::pin!(inbound);

        let reason = loop {
            match inbound.next().await {
                Some(Ok(envelope)) => {
                    if !self.registry.contains(id).await {
                        break "session removed".to_string();
                    }
                    if let Err(e) = self.on_event_received(id, envelope).await {
                        break e.to_string();
                    }
                }
                Some(Err(e)) => {
                    let error = redact_sensitive_data(&e.to_string());
                    warn!(session = %id, error = %error, "Dropping connection");
                    break e.to_string();
                }
                None => break "stream ended".to_string(),
            }
        };

        self.close_session(id, &reason).await;
    }

    /// Accept and serve a connection until it closes.
    pub async fn run_connection<S>(&self, handle: ConnectionHandle, inbound: S) -> SessionId
    where
        S: Stream<Item = Result<Envelope, RelayError>> + Send,
    {
        let id = self.accept_connection(handle).await;
        self.serve_connection(id, inbound).await;
        id
    }

    /// Send `id` every other key currently known. Failures are logged and
    /// skipped. Returns the number of keys sent.
    async fn catch_up(&self, id: SessionId) -> usize {
        let snapshot = self.registry.snapshot().await;
        let Some(own) = snapshot.iter().find(|s| s.id == id) else {
            return 0;
        };

        let mut sent = 0;
        for peer in snapshot.iter().filter(|s| s.id != id && s.is_keyed()) {
            match own.handle.send(&Envelope::announce(peer.public_key.clone())).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(session = %id, peer = %peer.id, error = %e, "Catch-up send failed");
                }
            }
        }
        sent
    }

    async fn close_session(&self, id: SessionId, reason: &str) {
        if self.registry.remove(id).await {
            info!(session = %id, reason = %redact_sensitive_data(reason), "Session closed");
            EventLogger::log_event(
                &id.to_string(),
                RelayEvent::SessionClosed {
                    reason: reason.to_string(),
                },
            );
        }
    }
}
