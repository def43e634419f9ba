//! # HTTP Retrieval Utilities
//!
//! An asynchronous API client wrapper around `reqwest`, with exponential
//! backoff retries for transient failures and standardized JSON response
//! handling.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Url;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use thiserror::Error;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";

/// Errors raised while building a client or executing a request.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// The base URL or the joined request URL is not a valid absolute URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The underlying `reqwest` client failed (builder, connection or body read).
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The request failed after the retry middleware gave up.
    #[error("request failed: {0}")]
    Request(#[from] reqwest_middleware::Error),

    /// The response body is not the expected JSON document.
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// A standardized container for API responses.
///
/// Wraps the deserialized data along with metadata about the HTTP
/// transaction, such as status codes and headers.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The successfully deserialized response body, if any.
    pub data: Option<T>,
    /// The raw error body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`, it handles the base URL, a per-request
/// timeout and automatic retries of transient failures.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
}

impl ApiClient {
    /// Creates a new `ApiClient` with a timeout and an exponential backoff retry policy.
    ///
    /// # Arguments
    /// * `base_url` - The absolute base URL for the API (e.g., "https://query1.finance.yahoo.com/").
    /// * `timeout` - Upper bound for a single attempt, connection included.
    /// * `max_retries` - How many times a transient failure is retried.
    ///
    /// # Errors
    /// Returns `RetrieveError::Url` if `base_url` is not absolute, or
    /// `RetrieveError::Client` if the TLS backend cannot be initialized.
    pub fn new(base_url: &str, timeout: Duration, max_retries: u32) -> Result<Self, RetrieveError> {
        let url = Url::parse(base_url)?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner: client,
            base_url: url,
        })
    }

    /// The base URL every request path is joined to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Performs a `GET` request and decodes a successful body as JSON.
    ///
    /// Non-2xx responses are not errors at this level: they come back with
    /// `success == false` and the raw body in `error_body`, so callers can
    /// decide how to treat them.
    ///
    /// # Arguments
    /// * `path` - The relative path to append to the base URL.
    /// * `query` - Query string pairs.
    pub async fn get_json<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse<T>, RetrieveError>
    where
        T: DeserializeOwned,
    {
        let full_url = self.base_url.join(path)?;
        let response = self.inner.get(full_url).query(query).send().await?;

        let status = response.status();
        let headers = response.headers().clone();

        if status.is_success() {
            let body = response.bytes().await?;
            let data = serde_json::from_slice::<T>(&body)?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers,
            })
        } else {
            // Kept for the caller's logs.
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
                headers,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_relative_base_url() {
        let result = ApiClient::new("not a url", Duration::from_secs(1), 0);
        assert!(matches!(result, Err(RetrieveError::Url(_))));
    }

    #[test]
    fn test_paths_join_onto_base_url() {
        let client = ApiClient::new("https://query1.finance.yahoo.com/", Duration::from_secs(1), 0)
            .expect("valid base url");
        let joined = client.base_url().join("v7/finance/quote").expect("joinable path");
        assert_eq!(joined.as_str(), "https://query1.finance.yahoo.com/v7/finance/quote");
    }
}
