//! # Financial Market Module
//!
//! Everything the broadcast engine needs to know about market data: the
//! `StockQuote` pushed to clients, how ticker symbols are validated, and the
//! `QuoteSource` seam with its Yahoo Finance implementation.
//!
//! ## Contained Modules:
//!
//! - **`quote`**: `RawQuote` (upstream field set) and `StockQuote` (wire
//!   message with derived `change` / `changePercent`).
//! - **`symbol`**: normalization and validation of requested symbols.
//! - **`source`**: the `QuoteSource` trait and `SourceError`.
//! - **`yahoo`**: `YahooQuoteSource`, backed by the v7 quote endpoint.

/// Quote data model and derived-field arithmetic.
pub mod quote;
/// Ticker symbol normalization and validation.
pub mod symbol;
/// The abstraction the broadcaster fetches quotes through.
pub mod source;
/// Yahoo Finance quote client.
pub mod yahoo;

pub use quote::{QuoteError, RawQuote, StockQuote};
pub use source::{QuoteSource, SourceError};
pub use symbol::{normalize_symbol, SymbolError};
pub use yahoo::YahooQuoteSource;
