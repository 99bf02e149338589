//! Resilient fragment fetching.
//!
//! This module turns fetch keys into fragments over a [`Transport`](crate::transport::Transport):
//!
//! - [`FragmentSource`] builds the URL for a key and parses the body
//! - [`RetryPolicy`] classifies failures and schedules exponential backoff
//! - [`ResilientFetcher`] gates every fetch through one admission semaphore,
//!   retries transient failures, and resolves everything else to "absent"
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use puzzle_core::RequestContext;
//! use puzzle_core::fetch::{JsonFragmentSource, ResilientFetcher, RetryPolicy, SourceConfig};
//! use puzzle_core::transport::{ConnectionConfig, ConnectionManager, HttpTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connections = Arc::new(ConnectionManager::new(ConnectionConfig::default()));
//! let transport = Arc::new(HttpTransport::new(Arc::clone(&connections), None));
//! let source = Arc::new(JsonFragmentSource::new(&SourceConfig::default())?);
//! let fetcher = ResilientFetcher::new(transport, source, 40, RetryPolicy::default())?;
//!
//! let ctx = RequestContext::new();
//! let fragments = fetcher.fetch_range(1, 10, |key| key, &ctx).await;
//! println!("found {}", fragments.len());
//! connections.release().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod fetcher;
mod retry;
mod source;

pub use error::FetchError;
pub use fetcher::{DEFAULT_CONCURRENCY, FetchStats, FetcherError, ResilientFetcher};
pub use retry::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
    FailureType, RetryDecision, RetryPolicy, classify_error,
};
pub use source::{FragmentSource, JsonFragmentSource, SourceConfig};
