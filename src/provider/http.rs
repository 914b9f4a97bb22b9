//! HTTP client abstraction for testability.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Transport-level HTTP errors, before provider-specific translation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The request did not complete within the client's timeout.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("HTTP {status}")]
    Status { status: u16 },

    /// Connection/DNS/protocol failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Trait for asynchronous HTTP GET operations.
///
/// Providers are generic over this trait so tests can inject mock clients
/// instead of hitting real upstream APIs.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// Returns the response body as bytes, or an error for timeouts,
    /// transport failures, and non-2xx statuses.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, HttpError>> + Send;

    /// Performs an HTTP GET request with custom headers.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `headers` - Slice of (header_name, header_value) tuples
    fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> impl Future<Output = Result<Vec<u8>, HttpError>> + Send;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

/// User-Agent sent on all outbound requests.
const USER_AGENT: &str = concat!("liveboard/", env!("CARGO_PKG_VERSION"));

impl ReqwestClient {
    /// Creates a client with the given per-request timeout.
    ///
    /// The client wraps a connection pool and is cheap to clone, so one
    /// instance is shared across both provider clients.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HttpError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, HttpError> {
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map(|body| body.to_vec())
            .map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Transport(err.to_string())
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.execute(self.client.get(url)).await
    }

    async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, HttpError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.execute(request).await
    }
}
