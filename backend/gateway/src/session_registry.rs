//! Active WebSocket Session Registry.
//!
//! Tracks live connections and the public key each one has announced.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use keyrelay_core::{Connection, SessionId};
use tokio::sync::RwLock;
use tracing::debug;

/// Registry-owned capability to write to exactly one client.
pub type ConnectionHandle = Arc<dyn Connection>;

struct Session {
    /// Empty until the first key announcement.
    public_key: String,
    handle: ConnectionHandle,
}

/// Point-in-time copy of one registry entry.
#[derive(Clone)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub public_key: String,
    pub handle: ConnectionHandle,
}

impl SessionSnapshot {
    pub fn is_keyed(&self) -> bool {
        !self.public_key.is_empty()
    }
}

/// Result of [`SessionRegistry::set_public_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyBinding {
    /// The key was empty and is now set.
    Bound,
    /// A key was already set; it is returned and left untouched.
    AlreadyBound(String),
    /// No such session (already removed).
    UnknownSession,
}

/// Manages live sessions.
///
/// Every operation runs under the registry lock, so a snapshot never
/// observes a half-applied add or remove. Operations on an id that is no
/// longer present are no-ops.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<BTreeMap<SessionId, Session>>>,
    next_id: Arc<AtomicU64>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a new session with no key yet.
    pub async fn add(&self, handle: ConnectionHandle) -> SessionId {
        let mut w = self.sessions.write().await;
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        w.insert(
            id,
            Session {
                public_key: String::new(),
                handle,
            },
        );
        debug!(session = %id, sessions = w.len(), "Session registered");
        id
    }

    /// Remove a session and close its connection.
    ///
    /// Returns `false` if the session was already gone.
    pub async fn remove(&self, id: SessionId) -> bool {
        let removed = {
            let mut w = self.sessions.write().await;
            w.remove(&id)
        };

        match removed {
            Some(session) => {
                session.handle.close();
                debug!(session = %id, "Session unregistered");
                true
            }
            None => false,
        }
    }

    /// Set the session's key if it has none yet. First writer wins.
    pub async fn set_public_key(&self, id: SessionId, key: &str) -> KeyBinding {
        let mut w = self.sessions.write().await;
        match w.get_mut(&id) {
            Some(session) if session.public_key.is_empty() => {
                session.public_key = key.to_string();
                KeyBinding::Bound
            }
            Some(session) => KeyBinding::AlreadyBound(session.public_key.clone()),
            None => KeyBinding::UnknownSession,
        }
    }

    /// Copy of every live session, ordered by id.
    pub async fn snapshot(&self) -> Vec<SessionSnapshot> {
        let r = self.sessions.read().await;
        r.iter()
            .map(|(id, session)| SessionSnapshot {
                id: *id,
                public_key: session.public_key.clone(),
                handle: Arc::clone(&session.handle),
            })
            .collect()
    }

    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Announced key of a session; `None` if absent or not yet keyed.
    pub async fn public_key(&self, id: SessionId) -> Option<String> {
        let r = self.sessions.read().await;
        r.get(&id)
            .map(|s| s.public_key.clone())
            .filter(|k| !k.is_empty())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn keyed_len(&self) -> usize {
        let r = self.sessions.read().await;
        r.values().filter(|s| !s.public_key.is_empty()).count()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
