//! Resilient fetcher: gated, retried, never-raising fragment fetches.
//!
//! # Concurrency Model
//!
//! - One [`Semaphore`] of `max_concurrency` permits is the admission gate for
//!   every fetch made through this fetcher, whether it comes from a probe range
//!   or a gap-fill pass
//! - A permit is held for the whole logical fetch, backoff sleeps included
//! - Batches fan out with `join_all` on the current task; nothing is spawned
//!
//! # Failure Handling
//!
//! - Transient errors (timeouts, connection failures) are retried per the
//!   [`RetryPolicy`]
//! - Non-200 statuses and malformed bodies resolve to `None` immediately
//! - No error ever escapes `fetch_one`; one item failing never affects siblings

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};
use url::Url;

use super::FetchError;
use super::retry::{FailureType, RetryDecision, RetryPolicy};
use super::source::FragmentSource;
use crate::context::RequestContext;
use crate::fragment::Fragment;
use crate::transport::Transport;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 1000;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 40;

/// Error type for fetcher construction.
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Running counters for every fetch made through one fetcher.
#[derive(Debug, Default)]
pub struct FetchStats {
    attempts: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

impl FetchStats {
    /// Outbound requests issued (every attempt, retries included).
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Logical fetches that produced a fragment.
    #[must_use]
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Logical fetches that resolved to "absent".
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Retries scheduled after transient failures.
    #[must_use]
    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::SeqCst)
    }

    fn increment_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }
}

/// Gated, retrying fetch primitive over a [`Transport`] and a [`FragmentSource`].
#[derive(Debug)]
pub struct ResilientFetcher {
    transport: Arc<dyn Transport>,
    source: Arc<dyn FragmentSource>,
    gate: Semaphore,
    max_concurrency: usize,
    retry_policy: RetryPolicy,
    stats: FetchStats,
}

impl ResilientFetcher {
    /// Creates a fetcher admitting at most `max_concurrency` fetches at once.
    ///
    /// # Errors
    ///
    /// Returns [`FetcherError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-1000).
    #[instrument(level = "debug", skip(transport, source, retry_policy))]
    pub fn new(
        transport: Arc<dyn Transport>,
        source: Arc<dyn FragmentSource>,
        max_concurrency: usize,
        retry_policy: RetryPolicy,
    ) -> Result<Self, FetcherError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&max_concurrency) {
            return Err(FetcherError::InvalidConcurrency {
                value: max_concurrency,
            });
        }

        debug!(
            max_concurrency,
            max_attempts = retry_policy.max_attempts(),
            "creating fetcher"
        );

        Ok(Self {
            transport,
            source,
            gate: Semaphore::new(max_concurrency),
            max_concurrency,
            retry_policy,
            stats: FetchStats::default(),
        })
    }

    /// Configured admission limit.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Admission slots currently free.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.gate.available_permits()
    }

    /// The retry policy in use.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    /// Fetches one fragment by key. Every failure resolves to `None`.
    #[instrument(level = "debug", skip(self, ctx), fields(correlation_id = %ctx.correlation_id()))]
    pub async fn fetch_one(&self, key: i64, ctx: &RequestContext) -> Option<Fragment> {
        let Ok(_permit) = self.gate.acquire().await else {
            warn!(key, "admission gate closed");
            return None;
        };

        match self.fetch_with_retry(key).await {
            Ok(fragment) => {
                self.stats.increment_succeeded();
                Some(fragment)
            }
            Err((error, attempts)) => {
                self.stats.increment_failed();
                match self.retry_policy.classify(&error) {
                    FailureType::Absent => debug!(key, error = %error, "fragment absent"),
                    FailureType::Malformed => warn!(key, error = %error, "invalid fragment data"),
                    FailureType::Transient => {
                        warn!(key, attempts, error = %error, "fetch failed after all attempts");
                    }
                    FailureType::Permanent => warn!(key, error = %error, "non-retryable fetch error"),
                }
                None
            }
        }
    }

    /// Fetches every key concurrently and returns the fragments found, in no
    /// particular order.
    pub async fn fetch_batch<I>(&self, keys: I, ctx: &RequestContext) -> Vec<Fragment>
    where
        I: IntoIterator<Item = i64>,
    {
        let fetches: Vec<_> = keys.into_iter().map(|key| self.fetch_one(key, ctx)).collect();
        let requested = fetches.len();
        debug!(requested, "starting batch fetch");

        let found: Vec<Fragment> = join_all(fetches).await.into_iter().flatten().collect();

        debug!(requested, successful = found.len(), "batch fetch completed");
        found
    }

    /// Fetches `count` keys produced by `key_builder(start + i)` for `i` in `[0, count)`.
    pub async fn fetch_range<F>(
        &self,
        start: i64,
        count: u32,
        key_builder: F,
        ctx: &RequestContext,
    ) -> Vec<Fragment>
    where
        F: Fn(i64) -> i64,
    {
        let keys = (0..i64::from(count)).map(|offset| key_builder(start + offset));
        self.fetch_batch(keys, ctx).await
    }

    /// Runs attempts until success, a non-retryable failure, or an exhausted budget.
    ///
    /// Returns the final error and the number of attempts made on failure.
    async fn fetch_with_retry(&self, key: i64) -> Result<Fragment, (FetchError, u32)> {
        let url = self.source.build_fetch_url(key).map_err(|e| (e, 0))?;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(url = %url, attempt, "fetching");

            let error = match self.attempt(&url).await {
                Ok(fragment) => return Ok(fragment),
                Err(error) => error,
            };

            match self
                .retry_policy
                .should_retry(self.retry_policy.classify(&error), attempt)
            {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    debug!(
                        url = %url,
                        attempt = next_attempt,
                        max_attempts = self.retry_policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying fetch"
                    );
                    self.stats.increment_retried();
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url = %url, %reason, "not retrying fetch");
                    return Err((error, attempt));
                }
            }
        }
    }

    async fn attempt(&self, url: &Url) -> Result<Fragment, FetchError> {
        self.stats.increment_attempts();
        let response = self.transport.get(url).await?;
        if !response.is_ok() {
            return Err(FetchError::http_status(url.as_str(), response.status));
        }
        self.source.parse_response(url, &response.body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::fetch::{JsonFragmentSource, SourceConfig};
    use crate::transport::TransportResponse;

    /// Scripted transport: per-key queue of outcomes, then 404 forever.
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        script: Mutex<HashMap<String, Vec<Result<TransportResponse, ()>>>>,
        calls: Mutex<HashMap<String, u32>>,
    }

    impl ScriptedTransport {
        fn push(&self, key: i64, outcome: Result<TransportResponse, ()>) {
            self.script
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_default()
                .push(outcome);
        }

        fn calls(&self, key: i64) -> u32 {
            *self.calls.lock().unwrap().get(&key.to_string()).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, url: &Url) -> Result<TransportResponse, FetchError> {
            let key = url
                .query_pairs()
                .find(|(name, _)| name == "id")
                .map(|(_, value)| value.into_owned())
                .unwrap();
            *self.calls.lock().unwrap().entry(key.clone()).or_default() += 1;

            let mut script = self.script.lock().unwrap();
            let queue = script.entry(key).or_default();
            if queue.is_empty() {
                return Ok(TransportResponse::new(404, ""));
            }
            match queue.remove(0) {
                Ok(response) => Ok(response),
                Err(()) => Err(FetchError::timeout(url.as_str())),
            }
        }
    }

    fn body(key: i64, position: i64, text: &str) -> TransportResponse {
        TransportResponse::new(
            200,
            format!(r#"{{"id": {key}, "index": {position}, "text": "{text}"}}"#),
        )
    }

    fn fetcher(transport: Arc<ScriptedTransport>, attempts: u32) -> ResilientFetcher {
        let source = JsonFragmentSource::new(&SourceConfig {
            base_url: "http://puzzle.test".to_string(),
            ..SourceConfig::default()
        })
        .unwrap();
        let policy = RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_millis(4), 2.0);
        ResilientFetcher::new(transport, Arc::new(source), 4, policy).unwrap()
    }

    #[test]
    fn test_fetcher_rejects_invalid_concurrency() {
        let transport = Arc::new(ScriptedTransport::default());
        let source = Arc::new(JsonFragmentSource::new(&SourceConfig::default()).unwrap());
        for value in [0, 1001] {
            let result = ResilientFetcher::new(
                transport.clone(),
                source.clone(),
                value,
                RetryPolicy::default(),
            );
            assert!(matches!(
                result,
                Err(FetcherError::InvalidConcurrency { value: v }) if v == value
            ));
        }
    }

    #[tokio::test]
    async fn test_fetch_one_success() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(1, Ok(body(1, 0, "Hello")));
        let fetcher = fetcher(Arc::clone(&transport), 3);

        let fragment = fetcher.fetch_one(1, &RequestContext::new()).await;

        assert_eq!(fragment, Some(Fragment::new(1, 0, "Hello")));
        assert_eq!(fetcher.stats().attempts(), 1);
        assert_eq!(fetcher.stats().succeeded(), 1);
    }

    #[tokio::test]
    async fn test_fetch_one_retries_transient_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(5, Err(()));
        transport.push(5, Err(()));
        transport.push(5, Ok(body(5, 4, "third")));
        let fetcher = fetcher(Arc::clone(&transport), 3);

        let fragment = fetcher.fetch_one(5, &RequestContext::new()).await;

        assert_eq!(fragment, Some(Fragment::new(5, 4, "third")));
        assert_eq!(transport.calls(5), 3);
        assert_eq!(fetcher.stats().attempts(), 3);
        assert_eq!(fetcher.stats().retried(), 2);
    }

    #[tokio::test]
    async fn test_fetch_one_exhausted_retries_resolves_to_none() {
        let transport = Arc::new(ScriptedTransport::default());
        for _ in 0..5 {
            transport.push(2, Err(()));
        }
        let fetcher = fetcher(Arc::clone(&transport), 3);

        assert_eq!(fetcher.fetch_one(2, &RequestContext::new()).await, None);
        assert_eq!(transport.calls(2), 3);
        assert_eq!(fetcher.stats().failed(), 1);
    }

    #[tokio::test]
    async fn test_fetch_one_absent_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(3, Ok(TransportResponse::new(503, "busy")));
        let fetcher = fetcher(Arc::clone(&transport), 3);

        assert_eq!(fetcher.fetch_one(3, &RequestContext::new()).await, None);
        assert_eq!(transport.calls(3), 1);
    }

    #[tokio::test]
    async fn test_fetch_one_malformed_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(4, Ok(TransportResponse::new(200, r#"{"invalid": "data"}"#)));
        let fetcher = fetcher(Arc::clone(&transport), 3);

        assert_eq!(fetcher.fetch_one(4, &RequestContext::new()).await, None);
        assert_eq!(transport.calls(4), 1);
        assert_eq!(fetcher.stats().retried(), 0);
    }

    #[tokio::test]
    async fn test_fetch_one_negative_key_makes_no_request() {
        let transport = Arc::new(ScriptedTransport::default());
        let fetcher = fetcher(Arc::clone(&transport), 3);

        assert_eq!(fetcher.fetch_one(-3, &RequestContext::new()).await, None);
        assert_eq!(fetcher.stats().attempts(), 0);
    }

    #[tokio::test]
    async fn test_fetch_batch_returns_only_successes() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(1, Ok(body(1, 0, "a")));
        transport.push(2, Err(()));
        transport.push(2, Err(()));
        transport.push(2, Err(()));
        transport.push(3, Ok(body(3, 2, "c")));
        let fetcher = fetcher(Arc::clone(&transport), 3);

        let mut found = fetcher.fetch_batch([1, 2, 3, 4], &RequestContext::new()).await;
        found.sort_by_key(|f| f.position);

        assert_eq!(found, vec![Fragment::new(1, 0, "a"), Fragment::new(3, 2, "c")]);
        assert_eq!(fetcher.available_slots(), fetcher.max_concurrency());
    }

    #[tokio::test]
    async fn test_fetch_range_uses_key_builder() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(20, Ok(body(20, 10, "x")));
        transport.push(22, Ok(body(22, 11, "y")));
        let fetcher = fetcher(Arc::clone(&transport), 1);

        let found = fetcher
            .fetch_range(10, 2, |i| i * 2, &RequestContext::new())
            .await;

        assert_eq!(found.len(), 2);
        assert_eq!(transport.calls(20), 1);
        assert_eq!(transport.calls(22), 1);
    }
}
