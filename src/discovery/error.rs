//! Error types for discovery.

use std::fmt;

use thiserror::Error;

/// Which bound stopped a discovery that could not close its gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallReason {
    /// The gap-fill pass ceiling was reached.
    PassLimit,
    /// A single gap was requested more times than its budget allows.
    GapBudget,
    /// The wall-clock deadline passed.
    Deadline,
    /// The observed span held more missing positions than allowed.
    SpanLimit,
}

impl fmt::Display for StallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PassLimit => "gap-fill pass limit reached",
            Self::GapBudget => "per-gap request budget exhausted",
            Self::Deadline => "discovery deadline exceeded",
            Self::SpanLimit => "missing-position ceiling exceeded",
        };
        f.write_str(label)
    }
}

/// Errors that end a discovery without a complete fragment set.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The initial batch size must be at least 1.
    #[error("invalid initial batch size {value}: must be at least 1")]
    InvalidBatchSize {
        /// The rejected value.
        value: u32,
    },

    /// The source never resolved some gaps within the configured bounds.
    #[error(
        "discovery stalled after {passes} gap-fill passes ({reason}); {unresolved} positions unresolved"
    )]
    Stalled {
        /// Which bound fired.
        reason: StallReason,
        /// Gap-fill passes completed.
        passes: u32,
        /// Positions still missing when discovery stopped, ascending. Capped
        /// at the configured missing-position ceiling.
        missing: Vec<i64>,
        /// Total number of positions still missing.
        unresolved: u64,
    },
}
