//! In-memory doubles for the registry and broadcaster tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::session::{Session, SessionError};
use crate::markets::quote::{RawQuote, StockQuote};
use crate::markets::source::{QuoteSource, SourceError};

/// Records every frame it is sent; can be told to fail.
pub(crate) struct RecordingSession {
    id: u64,
    frames: Mutex<Vec<String>>,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl RecordingSession {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            frames: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// A session whose transport is already gone.
    pub(crate) fn broken(id: u64) -> Arc<Self> {
        let session = Self::new(id);
        session.failing.store(true, Ordering::SeqCst);
        session
    }

    pub(crate) fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for RecordingSession {
    fn id(&self) -> u64 {
        self.id
    }

    async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("broken pipe".to_string()));
        }
        self.frames.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Serves canned quotes and counts calls per symbol.
#[derive(Default)]
pub(crate) struct StubSource {
    quotes: HashMap<String, RawQuote>,
    delays: HashMap<String, Duration>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StubSource {
    pub(crate) fn with(mut self, raw: RawQuote) -> Self {
        self.quotes.insert(raw.symbol.clone(), raw);
        self
    }

    /// Makes every fetch of `symbol` take `delay` before answering.
    pub(crate) fn with_delay(mut self, symbol: &str, delay: Duration) -> Self {
        self.delays.insert(symbol.to_string(), delay);
        self
    }

    pub(crate) fn calls(&self, symbol: &str) -> usize {
        self.calls.lock().unwrap().get(symbol).copied().unwrap_or(0)
    }
}

#[async_trait]
impl QuoteSource for StubSource {
    async fn fetch(&self, symbol: &str) -> Result<StockQuote, SourceError> {
        *self.calls.lock().unwrap().entry(symbol.to_string()).or_insert(0) += 1;
        if let Some(delay) = self.delays.get(symbol) {
            tokio::time::sleep(*delay).await;
        }
        let raw = self
            .quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(symbol.to_string()))?;
        Ok(StockQuote::from_raw(raw)?)
    }
}

/// A complete raw quote.
pub(crate) fn raw_quote(symbol: &str, close: f64, previous_close: f64) -> RawQuote {
    RawQuote {
        symbol: symbol.to_string(),
        regular_market_open: Some(previous_close),
        regular_market_day_high: Some(close.max(previous_close)),
        regular_market_day_low: Some(close.min(previous_close)),
        regular_market_price: Some(close),
        regular_market_previous_close: Some(previous_close),
        regular_market_time: Some(1_700_000_000),
        regular_market_volume: Some(1_000),
        market_cap: Some(1.0e9),
    }
}
