//! Caller-facing solve outcome.

use serde::Serialize;

use crate::fragment::FragmentSet;

/// Number of missing positions echoed in [`PuzzleStats`].
pub const MISSING_SAMPLE_SIZE: usize = 10;

/// Completion and throughput figures for one solve.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PuzzleStats {
    /// Distinct positions found.
    pub total_found: usize,
    /// Positions missing inside the observed span.
    pub missing_count: usize,
    /// `total_found / (total_found + missing_count)`, 0 when nothing was expected.
    pub completion_rate: f64,
    /// `completion_rate` in percent.
    pub completion_percentage: f64,
    /// Fragments found per elapsed second.
    pub fragments_per_second: f64,
    /// Whether no gap remains.
    pub is_complete: bool,
    /// The first missing positions, ascending.
    pub missing_positions_sample: Vec<i64>,
    /// HTTP attempts issued during the solve, retries included.
    pub total_requests: u64,
}

impl PuzzleStats {
    /// Computes stats for a discovered set.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_set(set: &FragmentSet, elapsed_seconds: f64, total_requests: u64) -> Self {
        let total_found = set.total_found();
        let missing = set.missing_positions();
        let expected = total_found + missing.len();
        let completion_rate = if expected == 0 {
            0.0
        } else {
            total_found as f64 / expected as f64
        };
        let fragments_per_second = if elapsed_seconds > 0.0 {
            total_found as f64 / elapsed_seconds
        } else {
            0.0
        };

        Self {
            total_found,
            missing_count: missing.len(),
            completion_rate,
            completion_percentage: completion_rate * 100.0,
            fragments_per_second,
            is_complete: missing.is_empty(),
            missing_positions_sample: missing.iter().take(MISSING_SAMPLE_SIZE).copied().collect(),
            total_requests,
        }
    }
}

/// Outcome of a solve. Failures are values: `error` is set and `text` is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PuzzleResult {
    /// Assembled text.
    pub text: String,
    /// Wall-clock time of the solve.
    pub elapsed_seconds: f64,
    /// Completion statistics.
    pub stats: PuzzleStats,
    /// Failure message, if the solve failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PuzzleResult {
    /// A successful result.
    #[must_use]
    pub fn success(text: String, elapsed_seconds: f64, stats: PuzzleStats) -> Self {
        Self {
            text,
            elapsed_seconds,
            stats,
            error: None,
        }
    }

    /// A failed result with zeroed stats.
    pub fn failure(message: impl Into<String>, elapsed_seconds: f64, total_requests: u64) -> Self {
        Self {
            text: String::new(),
            elapsed_seconds,
            stats: PuzzleStats {
                total_requests,
                ..PuzzleStats::default()
            },
            error: Some(message.into()),
        }
    }

    /// Whether this result carries an error marker.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
