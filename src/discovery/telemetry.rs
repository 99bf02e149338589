//! Discovery counters.
//!
//! The counters are the interface only; exporting them to a metrics backend
//! belongs to whoever embeds the library.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative fragment counters across discoveries.
#[derive(Debug, Default)]
pub struct DiscoveryCounters {
    found: AtomicU64,
    missing: AtomicU64,
    discoveries: AtomicU64,
    stalled: AtomicU64,
}

impl DiscoveryCounters {
    /// Fragments found by completed discoveries.
    #[must_use]
    pub fn fragments_found(&self) -> u64 {
        self.found.load(Ordering::SeqCst)
    }

    /// Positions left missing by completed or stalled discoveries.
    #[must_use]
    pub fn fragments_missing(&self) -> u64 {
        self.missing.load(Ordering::SeqCst)
    }

    /// Discoveries that ran to completion.
    #[must_use]
    pub fn discoveries(&self) -> u64 {
        self.discoveries.load(Ordering::SeqCst)
    }

    /// Discoveries that stopped on a stall bound.
    #[must_use]
    pub fn stalled(&self) -> u64 {
        self.stalled.load(Ordering::SeqCst)
    }

    pub(crate) fn record_complete(&self, found: usize, missing: usize) {
        self.found.fetch_add(found as u64, Ordering::SeqCst);
        self.missing.fetch_add(missing as u64, Ordering::SeqCst);
        self.discoveries.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_stalled(&self, unresolved: u64) {
        self.missing.fetch_add(unresolved, Ordering::SeqCst);
        self.stalled.fetch_add(1, Ordering::SeqCst);
    }
}
