//! # Data Retrieval Module
//!
//! Generic HTTP retrieval used by the quote sources. It encapsulates URL
//! joining, request timeouts, retries with exponential backoff and JSON
//! decoding, so the market clients only deal with their payload shapes.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: `ApiClient`, built on `reqwest` and `reqwest-middleware`.

/// Generic HTTP API client with retry middleware for resilient network requests.
pub mod ky_http;

pub use ky_http::{ApiClient, ApiResponse, RetrieveError};
