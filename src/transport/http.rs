//! The transport seam between the fetcher and the network.
//!
//! [`Transport`] issues one GET and hands back the raw status and body. It
//! knows nothing about fragments or retries. [`HttpTransport`] is the real
//! implementation over the [`ConnectionManager`]'s pooled session; tests plug
//! in instrumented fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;
use url::Url;

use super::connection::ConnectionManager;
use crate::fetch::FetchError;

/// Status and body of one completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Creates a response from parts.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is exactly 200.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Issues a single outbound GET.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Performs one GET against `url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] or [`FetchError::Network`] for
    /// transport-level failures. Non-200 statuses are NOT errors here.
    async fn get(&self, url: &Url) -> Result<TransportResponse, FetchError>;
}

/// [`Transport`] backed by the shared pooled session.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    connections: Arc<ConnectionManager>,
    request_timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a transport over `connections`.
    ///
    /// `request_timeout` additionally bounds each request; the session's own
    /// overall timeout still applies, and the tighter of the two wins.
    #[must_use]
    pub fn new(connections: Arc<ConnectionManager>, request_timeout: Option<Duration>) -> Self {
        Self {
            connections,
            request_timeout,
        }
    }

    fn effective_timeout(&self) -> Option<Duration> {
        let session_timeout = self.connections.config().request_timeout();
        self.request_timeout
            .map(|per_request| per_request.min(session_timeout))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, FetchError> {
        let session = self.connections.acquire().await?;

        let mut request = session.client().get(url.clone());
        if let Some(timeout) = self.effective_timeout() {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        trace!(url = %url, status, bytes = body.len(), "response received");
        Ok(TransportResponse::new(status, body.to_vec()))
    }
}
