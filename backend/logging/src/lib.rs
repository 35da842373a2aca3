//! Telemetry and structured logging components for KeyRelay.
//!
//! Handles console/file logger setup, redaction of key material, and relay
//! lifecycle event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, RelayEvent};
pub use logger::init_logger;
pub use redact::{fingerprint, redact_sensitive_data};
