//! Retry policy with exponential backoff for transient fetch failures.
//!
//! The policy is a plain value: attempt budget, backoff schedule, and the
//! predicate that classifies a [`FetchError`] into a [`FailureType`]. The
//! fetcher composes it around each attempt; nothing here performs I/O, so the
//! whole policy is testable on its own.
//!
//! # Example
//!
//! ```
//! use puzzle_core::fetch::{FetchError, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! let error = FetchError::timeout("http://puzzle-server:8080/fragment?id=7");
//!
//! match policy.should_retry(policy.classify(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::FetchError;

/// Default maximum attempts (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff (100 milliseconds).
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Default maximum delay cap (2 seconds).
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(2);

/// Default backoff multiplier (doubles each attempt).
pub const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Classification of a failed fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Timeout or connection failure; may succeed on retry.
    Transient,

    /// The source answered, but not with a fragment (any non-200 status).
    Absent,

    /// The body failed schema validation.
    Malformed,

    /// The request can never succeed (bad key, TLS, session build failure).
    Permanent,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Give up.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Retry budget, backoff schedule, and retryable-error predicate.
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay) + jitter
/// ```
///
/// With defaults (no jitter) the delays are 100ms then 200ms before the third
/// and final attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
    max_jitter: Duration,
    classifier: fn(&FetchError) -> FailureType,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: Duration::ZERO,
            classifier: classify_error,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings and the default classifier.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            ..Self::default()
        }
    }

    /// Creates a policy with a custom attempt budget and default backoff.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Adds up to `max_jitter` of random delay to every backoff.
    #[must_use]
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Replaces the retryable-error predicate.
    #[must_use]
    pub fn with_classifier(mut self, classifier: fn(&FetchError) -> FailureType) -> Self {
        self.classifier = classifier;
        self
    }

    /// Maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Classifies an error with this policy's predicate.
    #[must_use]
    pub fn classify(&self, error: &FetchError) -> FailureType {
        (self.classifier)(error)
    }

    /// Decides whether to retry after `attempt` (1-indexed) failed.
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Absent => {
                return RetryDecision::DoNotRetry {
                    reason: "fragment absent - source did not return 200".to_string(),
                };
            }
            FailureType::Malformed => {
                return RetryDecision::DoNotRetry {
                    reason: "malformed response - schema violations are not retried".to_string(),
                };
            }
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::Transient => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.calculate_delay(attempt),
            attempt: attempt + 1,
        }
    }

    /// Backoff delays (without jitter) between consecutive attempts.
    #[must_use]
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts)
            .map(|attempt| self.base_backoff(attempt))
            .collect()
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        self.base_backoff(attempt) + self.calculate_jitter()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn base_backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=self.max_jitter.as_millis() as u64);
        Duration::from_millis(jitter_ms)
    }
}

/// Default retryable-error predicate.
///
/// | Error | Type |
/// |-------|------|
/// | Timeout | Transient |
/// | Network (TLS rejection while connecting) | Permanent |
/// | Network (other) | Transient |
/// | HttpStatus (any) | Absent |
/// | Malformed | Malformed |
/// | InvalidKey | Permanent |
/// | Connection | Permanent |
#[must_use]
pub fn classify_error(error: &FetchError) -> FailureType {
    match error {
        FetchError::Timeout { .. } => FailureType::Transient,
        FetchError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        FetchError::HttpStatus { .. } => FailureType::Absent,
        FetchError::Malformed { .. } => FailureType::Malformed,
        FetchError::InvalidKey { .. } | FetchError::Connection(_) => FailureType::Permanent,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    error.is_connect() && !error.is_timeout() && has_tls_cause(error)
}

/// TLS stacks report handshake and certificate rejections as `InvalidData`
/// I/O errors. Resets and refusals carry other kinds and stay retryable.
fn has_tls_cause(error: &(dyn StdError + 'static)) -> bool {
    let mut cause = Some(error);
    while let Some(current) = cause {
        if current
            .downcast_ref::<io::Error>()
            .is_some_and(|io_error| io_error.kind() == io::ErrorKind::InvalidData)
        {
            return true;
        }
        cause = current.source();
    }
    false
}
