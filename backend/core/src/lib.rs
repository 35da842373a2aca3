//! Shared building blocks of the KeyRelay message relay: the wire envelope,
//! the error taxonomy, the connection abstraction and the inbound queue.

pub mod channel;
pub mod error;
pub mod message;
pub mod protocol;
pub mod traits;
pub mod types;

pub use channel::{RelayBus, DEFAULT_QUEUE_CAPACITY};
pub use error::RelayError;
pub use message::Inbound;
pub use protocol::{decode, encode, EncryptedPayload, Envelope};
pub use traits::{Component, Connection};
pub use types::SessionId;
