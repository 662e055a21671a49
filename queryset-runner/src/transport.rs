//! Transport seam between the fetch pool and the remote column source.

use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use queryset_core::retrieval::{RawResponse, BAD_GATEWAY_STATUS};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Anything that can turn a URL into a raw response.
///
/// Any answer from the remote, whatever its status, is `Ok`. Connection
/// failures are reported as a 502 response so they are classified like
/// any other upstream failure. Only running out of time is an `Err`.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, timeout: Option<Duration>) -> Result<RawResponse, TransportError>;
}

/// Blocking HTTP transport with one shared connection pool.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a client with no default timeout; each request carries the
    /// time left before the caller's deadline, if any.
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, timeout: Option<Duration>) -> Result<RawResponse, TransportError> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = match request.send() {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(TransportError::Timeout(url.to_string())),
            Err(e) => {
                debug!(url, error = %e, "request failed before a response arrived");
                return Ok(RawResponse::new(
                    BAD_GATEWAY_STATUS,
                    format!("could not reach {url}: {e}"),
                ));
            }
        };

        let status = response.status().as_u16();
        match response.bytes() {
            Ok(body) => Ok(RawResponse::new(status, body.to_vec())),
            Err(e) if e.is_timeout() => Err(TransportError::Timeout(url.to_string())),
            Err(e) => Ok(RawResponse::new(
                BAD_GATEWAY_STATUS,
                format!("failed to read response body from {url}: {e}"),
            )),
        }
    }
}
