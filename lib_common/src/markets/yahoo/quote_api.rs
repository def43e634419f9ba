//! # Yahoo Finance Quote Client
//!
//! Fetches a single symbol from `GET {base}/v7/finance/quote?symbols=<SYMBOL>`
//! and turns the first result into a `StockQuote`. Transient failures are
//! retried by the `ApiClient` middleware; everything else surfaces as a
//! `SourceError` and the broadcaster skips the symbol for that tick.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::markets::quote::{RawQuote, StockQuote};
use crate::markets::source::{QuoteSource, SourceError};
use crate::retrieve::{ApiClient, RetrieveError};

const QUOTE_PATH: &str = "v7/finance/quote";
const MAX_RETRIES: u32 = 2;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<RawQuote>,
    #[serde(default)]
    error: Option<Value>,
}

/// `QuoteSource` for Yahoo Finance.
pub struct YahooQuoteSource {
    client: ApiClient,
}

impl YahooQuoteSource {
    /// Public endpoint used when nothing else is configured.
    pub const DEFAULT_BASE_URL: &'static str = "https://query1.finance.yahoo.com/";

    /// Creates a client against `base_url` with a per-attempt `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RetrieveError> {
        Ok(Self {
            client: ApiClient::new(base_url, timeout, MAX_RETRIES)?,
        })
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteSource {
    async fn fetch(&self, symbol: &str) -> Result<StockQuote, SourceError> {
        let response = self
            .client
            .get_json::<QuoteEnvelope>(QUOTE_PATH, &[("symbols", symbol)])
            .await?;

        if !response.success {
            log::debug!(
                "Yahoo quote for {} failed with HTTP {}: {}",
                symbol,
                response.status,
                response.error_body.as_deref().unwrap_or("")
            );
            return Err(SourceError::Http { status: response.status });
        }

        let envelope = response
            .data
            .ok_or_else(|| SourceError::Decode("empty response body".to_string()))?;
        quote_from_envelope(envelope, symbol)
    }
}

/// Picks the quote for `symbol` out of a decoded response.
fn quote_from_envelope(envelope: QuoteEnvelope, symbol: &str) -> Result<StockQuote, SourceError> {
    let QuoteResponse { mut result, error } = envelope.quote_response;

    if let Some(error) = error.filter(|e| !e.is_null()) {
        return Err(SourceError::Decode(format!("upstream error: {}", error)));
    }

    // Exact symbol first; a lone entry is taken under any spelling (`BRK-B` for `BRK.B`)
    let raw = match result.iter().position(|q| q.symbol.eq_ignore_ascii_case(symbol)) {
        Some(index) => result.swap_remove(index),
        None if result.len() == 1 => result.swap_remove(0),
        None => return Err(SourceError::NotFound(symbol.to_string())),
    };

    Ok(StockQuote::from_raw(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markets::quote::QuoteError;

    fn decode(body: &str) -> QuoteEnvelope {
        serde_json::from_str(body).expect("valid envelope")
    }

    #[test]
    fn test_decodes_regular_market_fields() {
        let envelope = decode(
            r#"{"quoteResponse":{"result":[{
                "symbol":"AAPL",
                "regularMarketOpen":189.5,
                "regularMarketDayHigh":192.0,
                "regularMarketDayLow":188.25,
                "regularMarketPrice":191.0,
                "regularMarketPreviousClose":190.0,
                "regularMarketTime":1700000000,
                "regularMarketVolume":51234567,
                "marketCap":2950000000000,
                "shortName":"Apple Inc."
            }],"error":null}}"#,
        );

        let quote = quote_from_envelope(envelope, "AAPL").expect("quote");
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.open, 189.5);
        assert_eq!(quote.high, 192.0);
        assert_eq!(quote.low, 188.25);
        assert_eq!(quote.close, 191.0);
        assert_eq!(quote.previous_close, 190.0);
        assert_eq!(quote.timestamp, 1_700_000_000);
        assert_eq!(quote.volume, 51_234_567);
        assert_eq!(quote.value, 2.95e12);
        assert!((quote.change - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_result_is_not_found() {
        let envelope = decode(r#"{"quoteResponse":{"result":[],"error":null}}"#);
        let err = quote_from_envelope(envelope, "NOPE").unwrap_err();
        assert!(matches!(err, SourceError::NotFound(ref s) if s == "NOPE"));
    }

    #[test]
    fn test_upstream_error_object_fails_fetch() {
        let envelope = decode(
            r#"{"quoteResponse":{"result":[],"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#,
        );
        let err = quote_from_envelope(envelope, "AAPL").unwrap_err();
        assert!(matches!(err, SourceError::Decode(ref msg) if msg.contains("Invalid Crumb")));
    }

    #[test]
    fn test_zero_previous_close_fails_fetch() {
        let envelope = decode(
            r#"{"quoteResponse":{"result":[{
                "symbol":"ZERO","regularMarketPrice":1.0,"regularMarketPreviousClose":0
            }],"error":null}}"#,
        );
        let err = quote_from_envelope(envelope, "ZERO").unwrap_err();
        assert!(matches!(err, SourceError::Quote(QuoteError::NonFiniteChange { .. })));
    }

    #[test]
    fn test_prefers_exact_symbol_in_batch() {
        let envelope = decode(
            r#"{"quoteResponse":{"result":[
                {"symbol":"MSFT","regularMarketPrice":1.0,"regularMarketPreviousClose":1.0},
                {"symbol":"AAPL","regularMarketPrice":2.0,"regularMarketPreviousClose":1.0}
            ]}}"#,
        );
        let quote = quote_from_envelope(envelope, "AAPL").expect("quote");
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.close, 2.0);
    }

    #[test]
    fn test_batch_without_the_symbol_is_not_found() {
        let envelope = decode(
            r#"{"quoteResponse":{"result":[
                {"symbol":"MSFT","regularMarketPrice":1.0,"regularMarketPreviousClose":1.0},
                {"symbol":"GOOG","regularMarketPrice":2.0,"regularMarketPreviousClose":1.0}
            ]}}"#,
        );
        let err = quote_from_envelope(envelope, "AAPL").unwrap_err();
        assert!(matches!(err, SourceError::NotFound(ref s) if s == "AAPL"));
    }

    #[test]
    fn test_single_result_is_accepted_under_another_spelling() {
        let envelope = decode(
            r#"{"quoteResponse":{"result":[
                {"symbol":"BRK-B","regularMarketPrice":410.0,"regularMarketPreviousClose":400.0}
            ]}}"#,
        );
        let quote = quote_from_envelope(envelope, "BRK.B").expect("quote");
        assert_eq!(quote.symbol, "BRK-B");
        assert_eq!(quote.close, 410.0);
    }
}
