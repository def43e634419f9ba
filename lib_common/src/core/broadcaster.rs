//! # Broadcast Engine
//!
//! On every tick of a fixed-period timer the `Broadcaster`:
//!
//! 1.  Snapshots the registry's distinct symbols. Nothing subscribed, nothing to do.
//! 2.  Fetches each symbol exactly once, all symbols concurrently. A failing
//!     symbol is logged and skipped for this tick; the others proceed.
//! 3.  As soon as a symbol's quote arrives, serializes it once, takes a fresh
//!     subscriber snapshot for that symbol and pushes the same frame to every
//!     subscriber. No symbol waits for another symbol's fetch.
//! 4.  Treats a failed push as a dead session: the subscription is removed
//!     from the registry first, then the session is closed. No retry.
//!
//! Ticks never overlap: `run` awaits each tick before polling the timer again,
//! and the timer delays rather than bursts after a slow tick.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::core::registry::{Registry, Subscription};
use crate::markets::source::{QuoteSource, SourceError};

/// Period used when none is configured.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
enum FrameError {
    #[error(transparent)]
    Fetch(#[from] SourceError),
    #[error("cannot encode quote: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What one tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Distinct symbols in the registry snapshot.
    pub items: usize,
    /// Symbols fetched successfully.
    pub fetched: usize,
    /// Symbols skipped because the fetch failed.
    pub failed: usize,
    /// Frames delivered.
    pub pushed: usize,
    /// Subscriptions removed after a failed push.
    pub pruned: usize,
}

/// The periodic fetch-and-fan-out engine.
pub struct Broadcaster {
    registry: Arc<Registry>,
    source: Arc<dyn QuoteSource>,
    period: Duration,
}

impl Broadcaster {
    /// Creates an engine over an existing registry and quote source.
    pub fn new(registry: Arc<Registry>, source: Arc<dyn QuoteSource>, period: Duration) -> Self {
        Self {
            registry,
            source,
            period,
        }
    }

    /// Configured tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks every `period` until `shutdown` fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!("Broadcaster started with a period of {:?}", self.period);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    log::info!("Broadcaster received shutdown signal.");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    if report.items > 0 {
                        log::debug!("Tick: {:?}", report);
                    }
                }
            }
        }
    }

    /// Runs a single fetch-and-push cycle.
    pub async fn tick(&self) -> TickReport {
        let items = self.registry.distinct_items();
        let mut report = TickReport {
            items: items.len(),
            ..TickReport::default()
        };
        if items.is_empty() {
            return report;
        }

        // Each item goes from fetch to push on its own; a slow item holds back only itself
        let deliveries = items.iter().map(|item| self.deliver(item));
        for outcome in join_all(deliveries).await {
            match outcome {
                Some((pushed, pruned)) => {
                    report.fetched += 1;
                    report.pushed += pushed;
                    report.pruned += pruned;
                }
                None => report.failed += 1,
            }
        }

        report
    }

    /// Fetches and pushes one item; `None` when the item is skipped this tick.
    async fn deliver(&self, item: &str) -> Option<(usize, usize)> {
        match self.render(item).await {
            Ok(frame) => Some(self.push(item, &frame).await),
            Err(e) => {
                log::warn!("Skipping {} this tick: {}", item, e);
                None
            }
        }
    }

    async fn render(&self, item: &str) -> Result<String, FrameError> {
        let quote = self.source.fetch(item).await?;
        Ok(serde_json::to_string(&quote)?)
    }

    /// Pushes `frame` to the current subscribers of `item`; returns `(pushed, pruned)`.
    async fn push(&self, item: &str, frame: &str) -> (usize, usize) {
        let subscribers = self.registry.subscribers_of(item);
        let sends = subscribers.iter().map(|subscription| self.push_one(subscription, frame));

        join_all(sends)
            .await
            .into_iter()
            .fold((0, 0), |(pushed, pruned), delivered| {
                if delivered {
                    (pushed + 1, pruned)
                } else {
                    (pushed, pruned + 1)
                }
            })
    }

    async fn push_one(&self, subscription: &Arc<Subscription>, frame: &str) -> bool {
        match subscription.session().send_text(frame).await {
            Ok(()) => true,
            Err(e) => {
                log::info!(
                    "Push to session {} for {} failed ({}), dropping it",
                    subscription.session().id(),
                    subscription.item(),
                    e
                );
                self.registry.deregister(subscription);
                subscription.session().close().await;
                false
            }
        }
    }
}
