//! Shared fixtures for the end-to-end tests under `tests/`.

use async_trait::async_trait;
use lib_common::core::Registry;
use lib_common::markets::{QuoteSource, RawQuote, SourceError, StockQuote};
use servers::quote_logic::{downstream, state::AppState};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Quote source backed by a map that tests can change between ticks.
#[derive(Default)]
pub struct StubSource {
    quotes: Mutex<HashMap<String, RawQuote>>,
}

impl StubSource {
    pub fn set(&self, symbol: &str, close: f64, previous_close: f64) {
        self.quotes
            .lock()
            .unwrap()
            .insert(symbol.to_string(), raw_quote(symbol, close, previous_close));
    }
}

#[async_trait]
impl QuoteSource for StubSource {
    async fn fetch(&self, symbol: &str) -> Result<StockQuote, SourceError> {
        let raw = self.quotes.lock().unwrap().get(symbol).cloned();
        match raw {
            Some(raw) => Ok(StockQuote::from_raw(raw)?),
            None => Err(SourceError::NotFound(symbol.to_string())),
        }
    }
}

pub fn raw_quote(symbol: &str, close: f64, previous_close: f64) -> RawQuote {
    RawQuote {
        symbol: symbol.to_string(),
        regular_market_open: Some(previous_close),
        regular_market_day_high: Some(close.max(previous_close)),
        regular_market_day_low: Some(close.min(previous_close)),
        regular_market_price: Some(close),
        regular_market_previous_close: Some(previous_close),
        regular_market_time: Some(1_700_000_000),
        regular_market_volume: Some(1_000),
        market_cap: Some(1.0e12),
    }
}

/// A quote server on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<Registry>,
    shutdown: broadcast::Sender<()>,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let registry = Arc::new(Registry::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, _) = broadcast::channel(1);

        let app = downstream::router(AppState::new(registry.clone()));
        let handle = tokio::spawn(downstream::serve(listener, app, shutdown.subscribe()));

        Self {
            addr,
            registry,
            shutdown,
            handle,
        }
    }

    pub fn ws_url(&self, symbol: &str) -> String {
        format!("ws://{}/stock?symbol={}", self.addr, symbol)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Polls `condition` until it holds or `deadline` passes.
pub async fn wait_until<F, Fut>(deadline: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition().await
}
