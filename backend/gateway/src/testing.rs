//! In-memory connections for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use keyrelay_core::{Connection, Envelope, RelayError};

use crate::session_registry::SessionRegistry;

/// Upper bound on how long a test waits for background tasks.
const WAIT_LIMIT: Duration = Duration::from_secs(5);
const POLL_EVERY: Duration = Duration::from_millis(5);

/// Wait until `check` holds; panics after [`WAIT_LIMIT`].
pub async fn wait_for(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while !check() {
            tokio::time::sleep(POLL_EVERY).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Wait until the registry holds exactly `sessions` sessions, `keyed` of them keyed.
pub async fn wait_for_sessions(registry: &SessionRegistry, sessions: usize, keyed: usize) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while registry.len().await != sessions || registry.keyed_len().await != keyed {
            tokio::time::sleep(POLL_EVERY).await;
        }
    })
    .await
    .expect("registry did not reach the expected size in time");
}

/// Records everything sent to it; can be told to fail every write.
#[derive(Default)]
pub struct MockConnection {
    sent: Mutex<Vec<Envelope>>,
    fail_writes: AtomicBool,
    closed: AtomicBool,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A connection whose socket is already broken.
    pub fn failing() -> Arc<Self> {
        let conn = Self::default();
        conn.fail_writes.store(true, Ordering::SeqCst);
        Arc::new(conn)
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }

    /// Keys of every `exchangePublicKeys` envelope received, in order.
    pub fn announced_keys(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|e| match e {
                Envelope::KeyAnnouncement { sender_public_key } => Some(sender_public_key),
                Envelope::EncryptedPayload(_) => None,
            })
            .collect()
    }

    /// Ciphertexts of every `encryptedMessage` envelope received, in order.
    pub fn ciphertexts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|e| match e {
                Envelope::EncryptedPayload(p) => Some(p.ciphertext),
                Envelope::KeyAnnouncement { .. } => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&self, envelope: &Envelope) -> Result<(), RelayError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RelayError::send("broken pipe"));
        }
        if self.is_closed() {
            return Err(RelayError::send("connection closed"));
        }
        self.sent.lock().unwrap().push(envelope.clone());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
