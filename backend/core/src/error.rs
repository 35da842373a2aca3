use thiserror::Error;

/// Top-level error type for the KeyRelay runtime.
///
/// Every variant is local to the connection that produced it; nothing here
/// is allowed to stop the dispatch loop.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed envelope: {0}")]
    Decode(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("inbound queue closed")]
    QueueClosed,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RelayError {
    pub fn decode(reason: impl Into<String>) -> Self {
        RelayError::Decode(reason.into())
    }

    pub fn send(reason: impl Into<String>) -> Self {
        RelayError::Send(reason.into())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Decode(err.to_string())
    }
}
