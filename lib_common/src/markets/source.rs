//! The seam between the broadcast engine and wherever quotes come from.

use async_trait::async_trait;
use thiserror::Error;

use crate::markets::quote::{QuoteError, StockQuote};
use crate::retrieve::RetrieveError;

/// Resolves a symbol to its current quote.
///
/// The broadcaster calls `fetch` at most once per distinct symbol per tick,
/// possibly for several symbols concurrently.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetches the current snapshot for `symbol`.
    async fn fetch(&self, symbol: &str) -> Result<StockQuote, SourceError>;
}

/// A failed fetch. The symbol is skipped for the current tick only.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The upstream answered with a non-2xx status.
    #[error("upstream returned HTTP {status}")]
    Http {
        /// HTTP status code.
        status: u16,
    },

    /// The response was not the expected payload.
    #[error("malformed upstream payload: {0}")]
    Decode(String),

    /// The upstream does not know the symbol.
    #[error("symbol {0} not found upstream")]
    NotFound(String),

    /// The quote decoded but is unusable.
    #[error(transparent)]
    Quote(#[from] QuoteError),
}

impl From<RetrieveError> for SourceError {
    fn from(err: RetrieveError) -> Self {
        match err {
            RetrieveError::Json(e) => SourceError::Decode(e.to_string()),
            other => SourceError::Transport(other.to_string()),
        }
    }
}
