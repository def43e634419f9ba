//! # Stock Quote Data Model
//!
//! `RawQuote` mirrors the `regularMarket*` field set returned by the upstream
//! quote API. `StockQuote` is the point-in-time snapshot pushed to clients,
//! with `change` and `changePercent` derived from the close and previous close.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a raw upstream quote cannot become a `StockQuote`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuoteError {
    /// A field the derived values depend on is absent.
    #[error("quote for {symbol} is missing {field}")]
    MissingField {
        /// Symbol of the offending quote.
        symbol: String,
        /// Upstream name of the absent field.
        field: &'static str,
    },

    /// `change` or `changePercent` is NaN or infinite, e.g. a zero previous close.
    #[error("quote for {symbol} has a non-finite change (close {close}, previous close {previous_close})")]
    NonFiniteChange {
        /// Symbol of the offending quote.
        symbol: String,
        /// Last price.
        close: f64,
        /// Previous session close.
        previous_close: f64,
    },
}

/// One quote as returned by the upstream API.
///
/// Only `symbol` is mandatory in the payload; numeric fields are optional so a
/// sparse quote still decodes and is judged by `StockQuote::from_raw`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuote {
    /// Ticker symbol as reported upstream.
    pub symbol: String,
    /// Session open.
    pub regular_market_open: Option<f64>,
    /// Session high.
    pub regular_market_day_high: Option<f64>,
    /// Session low.
    pub regular_market_day_low: Option<f64>,
    /// Last traded price.
    pub regular_market_price: Option<f64>,
    /// Previous session close.
    pub regular_market_previous_close: Option<f64>,
    /// Time of the last trade, epoch seconds.
    pub regular_market_time: Option<i64>,
    /// Session volume.
    pub regular_market_volume: Option<i64>,
    /// Market capitalization.
    pub market_cap: Option<f64>,
}

/// The snapshot pushed to every subscriber of a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockQuote {
    /// Ticker symbol.
    pub symbol: String,
    /// Session open.
    pub open: f64,
    /// Session high.
    pub high: f64,
    /// Session low.
    pub low: f64,
    /// Last traded price.
    pub close: f64,
    /// Previous session close.
    pub previous_close: f64,
    /// Time of the last trade, epoch seconds.
    pub timestamp: i64,
    /// Session volume.
    pub volume: i64,
    /// Market capitalization.
    pub value: f64,
    /// `close - previous_close`.
    pub change: f64,
    /// `change / previous_close * 100`.
    pub change_percent: f64,
}

impl StockQuote {
    /// Builds the snapshot and computes the derived fields.
    ///
    /// # Errors
    /// - `QuoteError::MissingField` if the price or previous close is absent.
    /// - `QuoteError::NonFiniteChange` if the derived values are not finite,
    ///   which is the case for a previous close of zero.
    pub fn from_raw(raw: RawQuote) -> Result<Self, QuoteError> {
        let close = raw.regular_market_price.ok_or_else(|| QuoteError::MissingField {
            symbol: raw.symbol.clone(),
            field: "regularMarketPrice",
        })?;
        let previous_close = raw.regular_market_previous_close.ok_or_else(|| QuoteError::MissingField {
            symbol: raw.symbol.clone(),
            field: "regularMarketPreviousClose",
        })?;

        let change = close - previous_close;
        let change_percent = change / previous_close * 100.0;
        if !change.is_finite() || !change_percent.is_finite() {
            return Err(QuoteError::NonFiniteChange {
                symbol: raw.symbol,
                close,
                previous_close,
            });
        }

        Ok(Self {
            symbol: raw.symbol,
            open: raw.regular_market_open.unwrap_or_default(),
            high: raw.regular_market_day_high.unwrap_or_default(),
            low: raw.regular_market_day_low.unwrap_or_default(),
            close,
            previous_close,
            timestamp: raw.regular_market_time.unwrap_or_default(),
            volume: raw.regular_market_volume.unwrap_or_default(),
            value: raw.market_cap.unwrap_or_default(),
            change,
            change_percent,
        })
    }
}
