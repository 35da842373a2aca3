//! Dispatch Engine.
//!
//! The single consumer of the inbound queue. Envelopes are handled one at a
//! time in queue order, which gives every client the same order of key
//! broadcasts.

use anyhow::Result;
use async_trait::async_trait;
use keyrelay_core::{Component, EncryptedPayload, Envelope, Inbound, SessionId};
use keyrelay_logging::{EventLogger, RelayEvent, fingerprint};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::session_registry::{SessionRegistry, SessionSnapshot};

/// Routes inbound envelopes to the sessions that should see them.
pub struct Dispatcher {
    registry: SessionRegistry,
}

impl Dispatcher {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Route one envelope. Returns the number of successful deliveries.
    pub async fn dispatch(&self, inbound: Inbound) -> usize {
        let Inbound { origin, envelope } = inbound;
        match &envelope {
            Envelope::KeyAnnouncement { sender_public_key } => {
                debug!(
                    origin = %origin,
                    key = %fingerprint(sender_public_key),
                    "Broadcasting public key"
                );
                self.broadcast_key(origin, &envelope).await
            }
            Envelope::EncryptedPayload(payload) => {
                let delivered = self.route_payload(payload, &envelope).await;
                EventLogger::log_event(
                    &origin.to_string(),
                    RelayEvent::PayloadRouted {
                        receiver: payload.receiver_public_key.clone(),
                        recipients: delivered,
                    },
                );
                delivered
            }
        }
    }

    /// Send a key announcement to every session except its origin.
    async fn broadcast_key(&self, origin: SessionId, envelope: &Envelope) -> usize {
        let targets = self.registry.snapshot().await;
        let mut delivered = 0;
        for target in targets.iter().filter(|s| s.id != origin) {
            if self.deliver(target, envelope).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Send a payload verbatim to every session holding the receiver key.
    async fn route_payload(&self, payload: &EncryptedPayload, envelope: &Envelope) -> usize {
        let targets = self.registry.snapshot().await;
        let mut delivered = 0;
        for target in targets
            .iter()
            .filter(|s| s.is_keyed() && s.public_key == payload.receiver_public_key)
        {
            if self.deliver(target, envelope).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Write to one session; a failed write tears that session down.
    async fn deliver(&self, target: &SessionSnapshot, envelope: &Envelope) -> bool {
        match target.handle.send(envelope).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    session = %target.id,
                    kind = envelope.kind(),
                    error = %e,
                    "Delivery failed, dropping session"
                );
                if self.registry.remove(target.id).await {
                    EventLogger::log_event(
                        &target.id.to_string(),
                        RelayEvent::SessionClosed {
                            reason: e.to_string(),
                        },
                    );
                }
                false
            }
        }
    }
}

#[async_trait]
impl Component for Dispatcher {
    fn name(&self) -> &str {
        "dispatcher"
    }

    async fn start(&self, mut rx: mpsc::Receiver<Inbound>) -> Result<()> {
        info!("Dispatcher started");

        while let Some(inbound) = rx.recv().await {
            self.dispatch(inbound).await;
        }

        info!("Dispatcher stopped: inbound queue closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;
    use keyrelay_core::RelayBus;

    fn payload_for(receiver: &str, ciphertext: &str) -> Envelope {
        Envelope::EncryptedPayload(EncryptedPayload {
            receiver_public_key: receiver.into(),
            ciphertext: ciphertext.into(),
            iv: Some("iv".into()),
            signature: Some("sig".into()),
            sender_username: Some("alice".into()),
            sender_public_key: None,
        })
    }

    #[tokio::test]
    async fn test_key_broadcast_skips_origin() {
        let registry = SessionRegistry::new();
        let a = MockConnection::new();
        let b = MockConnection::new();
        let unkeyed = MockConnection::new();
        let a_id = registry.add(a.clone()).await;
        let b_id = registry.add(b.clone()).await;
        registry.add(unkeyed.clone()).await;
        registry.set_public_key(a_id, "ka").await;
        registry.set_public_key(b_id, "kb").await;

        let dispatcher = Dispatcher::new(registry);
        let delivered = dispatcher
            .dispatch(Inbound::new(a_id, Envelope::announce("ka")))
            .await;

        assert_eq!(delivered, 2);
        assert!(a.sent().is_empty());
        assert_eq!(b.announced_keys(), vec!["ka".to_string()]);
        assert_eq!(unkeyed.announced_keys(), vec!["ka".to_string()]);
    }

    #[tokio::test]
    async fn test_payload_reaches_every_holder_of_the_key() {
        let registry = SessionRegistry::new();
        let a = MockConnection::new();
        let b = MockConnection::new();
        let c = MockConnection::new();
        let a_id = registry.add(a.clone()).await;
        let b_id = registry.add(b.clone()).await;
        let c_id = registry.add(c.clone()).await;
        registry.set_public_key(a_id, "keyA").await;
        registry.set_public_key(b_id, "keyB").await;
        registry.set_public_key(c_id, "keyB").await;

        let dispatcher = Dispatcher::new(registry);
        let envelope = payload_for("keyB", "secret");
        let delivered = dispatcher.dispatch(Inbound::new(a_id, envelope.clone())).await;

        assert_eq!(delivered, 2);
        assert!(a.sent().is_empty());
        assert_eq!(b.sent(), vec![envelope.clone()]);
        assert_eq!(c.sent(), vec![envelope]);
    }

    #[tokio::test]
    async fn test_payload_for_unknown_key_goes_nowhere() {
        let registry = SessionRegistry::new();
        let a = MockConnection::new();
        let unkeyed = MockConnection::new();
        let a_id = registry.add(a.clone()).await;
        registry.add(unkeyed.clone()).await;
        registry.set_public_key(a_id, "keyA").await;

        let dispatcher = Dispatcher::new(registry.clone());
        let delivered = dispatcher
            .dispatch(Inbound::new(a_id, payload_for("nobody", "secret")))
            .await;

        assert_eq!(delivered, 0);
        assert!(a.sent().is_empty());
        assert!(unkeyed.sent().is_empty());
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_recipient_is_removed_without_blocking_others() {
        let registry = SessionRegistry::new();
        let sender = MockConnection::new();
        let b = MockConnection::failing();
        let c = MockConnection::new();
        let sender_id = registry.add(sender.clone()).await;
        let b_id = registry.add(b.clone()).await;
        let c_id = registry.add(c.clone()).await;
        registry.set_public_key(sender_id, "keyA").await;
        registry.set_public_key(b_id, "shared").await;
        registry.set_public_key(c_id, "shared").await;

        let dispatcher = Dispatcher::new(registry.clone());
        let delivered = dispatcher
            .dispatch(Inbound::new(sender_id, payload_for("shared", "hello")))
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(c.ciphertexts(), vec!["hello".to_string()]);
        assert!(b.is_closed());
        assert!(!registry.contains(b_id).await);
        assert!(registry.contains(c_id).await);
        assert!(registry.contains(sender_id).await);
    }

    #[tokio::test]
    async fn test_failed_broadcast_recipient_is_removed() {
        let registry = SessionRegistry::new();
        let origin = MockConnection::new();
        let broken = MockConnection::failing();
        let healthy = MockConnection::new();
        let origin_id = registry.add(origin.clone()).await;
        let broken_id = registry.add(broken.clone()).await;
        registry.add(healthy.clone()).await;
        registry.set_public_key(origin_id, "ko").await;

        let dispatcher = Dispatcher::new(registry.clone());
        dispatcher
            .dispatch(Inbound::new(origin_id, Envelope::announce("ko")))
            .await;

        assert!(!registry.contains(broken_id).await);
        assert_eq!(healthy.announced_keys(), vec!["ko".to_string()]);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_dispatch_from_removed_origin_does_not_panic() {
        let registry = SessionRegistry::new();
        let listener = MockConnection::new();
        registry.add(listener.clone()).await;

        let dispatcher = Dispatcher::new(registry);
        let delivered = dispatcher
            .dispatch(Inbound::new(SessionId::new(404), Envelope::announce("kg")))
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(listener.announced_keys(), vec!["kg".to_string()]);
    }

    #[tokio::test]
    async fn test_start_processes_queue_in_order_until_closed() {
        let registry = SessionRegistry::new();
        let a = MockConnection::new();
        let b = MockConnection::new();
        let a_id = registry.add(a.clone()).await;
        let b_id = registry.add(b.clone()).await;
        registry.set_public_key(b_id, "kb").await;

        let mut bus = RelayBus::new();
        let rx = bus.take_inbound_rx().unwrap();
        let tx = bus.inbound_tx.clone();
        drop(bus);

        for n in 0..3 {
            tx.send(Inbound::new(a_id, payload_for("kb", &format!("m{n}"))))
                .await
                .unwrap();
        }
        drop(tx);

        let dispatcher = Dispatcher::new(registry);
        assert_eq!(dispatcher.name(), "dispatcher");
        dispatcher.start(rx).await.unwrap();

        assert_eq!(
            b.ciphertexts(),
            vec!["m0".to_string(), "m1".to_string(), "m2".to_string()]
        );
    }
}
