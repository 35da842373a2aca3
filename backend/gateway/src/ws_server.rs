//! WebSocket entrypoint and connection handler.
//!
//! Upgrades HTTP to WS, splits the socket, and hands the read half to the
//! relay while a writer task owns the sink.

use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{
    future,
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use keyrelay_core::{Connection, Envelope, RelayError, decode, encode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::relay::Relay;
use crate::server::GatewayState;

/// Frames buffered per client before it counts as too slow and is dropped.
pub const OUTBOUND_CAPACITY: usize = 128;

/// How long the writer gets to flush the Close frame once the reader is done.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Registry handle for a WebSocket client: a bounded queue drained by the
/// writer task. A full queue is a failed send, never a wait.
pub struct WsConnection {
    tx: mpsc::Sender<Message>,
}

impl WsConnection {
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&self, envelope: &Envelope) -> Result<(), RelayError> {
        let json = encode(envelope)?;
        self.tx
            .try_send(Message::Text(json.into()))
            .map_err(|e| match e {
                TrySendError::Full(_) => RelayError::send("outbound queue full"),
                TrySendError::Closed(_) => RelayError::send("writer task gone"),
            })
    }

    fn close(&self) {
        // If the queue is full the writer still stops once every handle is dropped.
        let _ = self.tx.try_send(Message::Close(None));
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state.relay))
}

async fn handle_connection(socket: WebSocket, relay: Relay) {
    let (sender, receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);

    let id = relay.accept_connection(Arc::new(WsConnection::new(tx))).await;

    let mut send_task = tokio::spawn(writer_task(sender, rx));

    let inbound = receiver.filter_map(|frame| future::ready(decode_frame(frame)));

    // Whichever half finishes first ends the session.
    let writer_done = tokio::select! {
        _ = &mut send_task => true,
        _ = relay.serve_connection(id, inbound) => false,
    };

    relay.on_connection_closed(id).await;

    if !writer_done && tokio::time::timeout(CLOSE_GRACE, &mut send_task).await.is_err() {
        send_task.abort();
    }
    debug!(session = %id, "WebSocket connection closed");
}

/// Forward queued messages to the socket until a write fails or a Close is sent.
async fn writer_task(mut sender: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Message>) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if sender.send(msg).await.is_err() || closing {
            break;
        }
    }
}

/// Map a raw frame to a relay event. Control frames are dropped; a Close or
/// a transport error ends the stream with an error.
fn decode_frame(frame: Result<Message, axum::Error>) -> Option<Result<Envelope, RelayError>> {
    match frame {
        Ok(Message::Text(text)) => Some(decode(text.as_str().as_bytes())),
        Ok(Message::Binary(data)) => Some(decode(&data)),
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
        Ok(Message::Close(_)) => Some(Err(RelayError::Receive("closed by client".into()))),
        Err(e) => Some(Err(RelayError::Receive(e.to_string()))),
    }
}
