//! Explicit per-request context passed down the call chain.

use std::fmt;

use uuid::Uuid;

/// Correlation data for one logical request (a solve, a discovery, a probe).
///
/// Passed by reference from the entry point to every fetch so log lines and
/// spans can be tied together without task-local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    correlation_id: String,
}

impl RequestContext {
    /// Creates a context with a fresh random correlation id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Creates a context with a caller-supplied correlation id.
    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
        }
    }

    /// The correlation id.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.correlation_id)
    }
}
