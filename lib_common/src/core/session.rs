use async_trait::async_trait;
use thiserror::Error;

/// One live client connection, as seen by the registry and the broadcaster.
///
/// Implementations must tolerate `send_text` and `close` being called
/// concurrently from the connection's own handler and from a broadcast tick.
/// `close` must be idempotent.
#[async_trait]
pub trait Session: Send + Sync {
    /// Process-unique identifier, used in logs.
    fn id(&self) -> u64;

    /// Sends one text frame.
    async fn send_text(&self, text: &str) -> Result<(), SessionError>;

    /// Closes the connection. Later sends fail with `SessionError::Closed`.
    async fn close(&self);
}

/// A push that did not reach the client. The session is considered dead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session was already closed locally.
    #[error("session is closed")]
    Closed,

    /// The transport rejected the frame.
    #[error("transport error: {0}")]
    Transport(String),
}
