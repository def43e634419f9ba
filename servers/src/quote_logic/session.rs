use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::SinkExt;
use futures_util::stream::SplitSink;
use lib_common::core::{Session, SessionError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// The write half of one `/stock` WebSocket.
///
/// The read half stays with the connection handler, which only uses it to
/// notice the peer going away.
pub struct WsSession {
    id: u64,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    closed: AtomicBool,
}

impl WsSession {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Session for WsSession {
    fn id(&self) -> u64 {
        self.id
    }

    async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.to_owned().into()))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        // Sends a Close frame; the peer's reply ends the handler's read loop.
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.close().await {
            log::debug!("Closing client {}: {}", self.id, e);
        }
    }
}
