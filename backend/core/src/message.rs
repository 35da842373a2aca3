use crate::protocol::Envelope;
use crate::types::SessionId;

/// An envelope on its way from a connection handler to the dispatcher.
///
/// `origin` is fixed when the envelope is read and decides who is excluded
/// from a key broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub origin: SessionId,
    pub envelope: Envelope,
}

impl Inbound {
    pub fn new(origin: SessionId, envelope: Envelope) -> Self {
        Self { origin, envelope }
    }
}
