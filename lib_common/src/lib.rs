//! # lib_common
//!
//! Shared building blocks for the stock quote fan-out server. Each top-level
//! module is gated behind a feature of the same name.
//!
//! - **`core`**: the subscription registry, the `Session` seam and the
//!   periodic `Broadcaster` that fetches quotes and pushes them to sessions.
//! - **`markets`**: the `StockQuote` model, symbol validation and the
//!   `QuoteSource` implementations (Yahoo Finance).
//! - **`retrieve`**: the HTTP `ApiClient` with retry middleware.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

#[cfg(feature = "core")]
pub mod core;
#[cfg(feature = "markets")]
pub mod markets;
#[cfg(feature = "retrieve")]
pub mod retrieve;
