//! HTTP transport with bounded retry.
//!
//! Only transport-level failures (connect errors, timeouts) are retried; any
//! response the server actually produced is returned as-is, error status or
//! not. Retry decisions on statuses belong to the protocol layer.

use crate::error::{ClientError, ClientResult};
use std::time::Duration;

/// Attempts per request before giving up.
pub const NUM_ATTEMPTS: u32 = 3;

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(4000);

/// An HTTP client that retries failed sends.
#[derive(Clone)]
pub struct RetryingTransport {
    http: reqwest::Client,
}

impl RetryingTransport {
    pub fn new() -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::InvalidEndpoint(e.to_string()))?;
        Ok(Self { http })
    }

    /// Send a request, rebuilding it for each attempt.
    ///
    /// The builder closure is invoked per attempt because request bodies
    /// (multipart in particular) are not reusable across sends.
    pub async fn execute<F>(&self, build: F) -> ClientResult<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match build(&self.http).send().await {
                Ok(response) => return Ok(response),
                Err(source) if attempt < NUM_ATTEMPTS => {
                    tracing::warn!(attempt, error = %source, "request failed, retrying");
                }
                Err(source) => {
                    return Err(ClientError::Transport {
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }
}
