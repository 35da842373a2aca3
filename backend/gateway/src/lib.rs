//! KeyRelay Gateway
//!
//! Session registry, dispatcher, per-connection handling and the HTTP/WebSocket
//! surface of the relay.

pub mod client_ui;
pub mod dispatch;
pub mod health_api;
pub mod relay;
pub mod server;
pub mod session_registry;
pub mod ws_server;

#[cfg(test)]
mod testing;

pub use dispatch::Dispatcher;
pub use relay::Relay;
pub use server::{GatewayState, build_router, start_server};
pub use session_registry::{ConnectionHandle, KeyBinding, SessionRegistry, SessionSnapshot};
