//! Yahoo Finance quote retrieval.

/// `QuoteSource` backed by the v7 `finance/quote` endpoint.
pub mod quote_api;

pub use quote_api::YahooQuoteSource;
