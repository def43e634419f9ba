//! # Core Engine Module
//!
//! The subscription registry and broadcast engine. This is the only part of
//! the server with shared mutable state.
//!
//! ## Core Components:
//!
//! - **`session`**: the `Session` trait, a thin handle over one client
//!   connection that can send a text frame and be closed.
//! - **`registry`**: the authoritative set of `(session, symbol)`
//!   subscriptions behind a multi-reader/single-writer lock.
//! - **`broadcaster`**: the fixed-period engine that fetches each subscribed
//!   symbol once and fans the quote out to every subscriber, pruning sessions
//!   whose push fails.
//!
//! The registry is created once by the binary and injected into both the
//! connection handler and the broadcaster.

/// The periodic fetch-and-fan-out engine.
pub mod broadcaster;
/// Subscription bookkeeping.
pub mod registry;
/// Client connection seam.
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

// --- Public API Re-exports ---
pub use broadcaster::{Broadcaster, TickReport, DEFAULT_PERIOD};
pub use registry::{Registry, Subscription, SubscriptionGuard, SubscriptionId};
pub use session::{Session, SessionError};
