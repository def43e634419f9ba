//! # Quote Fan-out Server
//!
//! The WebSocket front of the stock quote service. Clients connect to
//! `/stock?symbol=<SYMBOL>` and receive one JSON quote per broadcast tick
//! until they disconnect. The registry and the broadcast engine live in
//! `lib_common::core`; this crate supplies the transport, configuration,
//! logging and process wiring.

pub mod quote_logic;
