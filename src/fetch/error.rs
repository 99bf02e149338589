//! Error types for the fetch module.
//!
//! These errors never leave a fetch: the fetcher classifies them, retries the
//! transient ones, and resolves everything else to "fragment absent". They
//! exist so classification and logging have full context.

use thiserror::Error;

use crate::transport::ConnectionError;

/// Errors that can occur during one fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection refused, reset, body read failure).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The request exceeded one of its timeouts.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The source answered with a status other than 200.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The body did not match `{id:int, index:int, text:string}`.
    #[error("malformed fragment from {url}: {reason}")]
    Malformed {
        /// The URL whose body failed to parse.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The fetch key cannot be turned into a request.
    #[error("invalid fetch key {key}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: i64,
        /// Why it was rejected.
        reason: String,
    },

    /// The pooled session could not be obtained.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl FetchError {
    /// Maps a reqwest error, separating timeouts from other network failures.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a malformed-response error.
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid-key error.
    pub fn invalid_key(key: i64, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key,
            reason: reason.into(),
        }
    }
}
