//! Initial probe ranges.

use std::fmt;

/// Number of contiguous ranges probed up front.
///
/// Coverage past `PROBE_RANGE_COUNT * batch_size` keys comes only from gap
/// filling, never from an extra probe range.
pub const PROBE_RANGE_COUNT: usize = 4;

/// Closed interval `[start, end]` of fetch keys probed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryRange {
    start: i64,
    end: i64,
}

impl DiscoveryRange {
    /// Creates `[start, end]`. Callers guarantee `start <= end`.
    #[must_use]
    pub fn new(start: i64, end: i64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// First key.
    #[must_use]
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Last key (inclusive).
    #[must_use]
    pub fn end(&self) -> i64 {
        self.end
    }

    /// Number of keys in the range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn width(&self) -> u32 {
        (self.end - self.start + 1) as u32
    }

    /// Whether `key` lies inside the range.
    #[must_use]
    pub fn contains(&self, key: i64) -> bool {
        (self.start..=self.end).contains(&key)
    }
}

impl fmt::Display for DiscoveryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.start, self.end)
    }
}

/// The four probe ranges of width `batch_size`, starting at key 1:
/// `[1,B] [B+1,2B] [2B+1,3B] [3B+1,4B]`.
///
/// `batch_size` must be at least 1.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn probe_ranges(batch_size: u32) -> [DiscoveryRange; PROBE_RANGE_COUNT] {
    let width = i64::from(batch_size);
    std::array::from_fn(|slot| {
        let slot = slot as i64;
        DiscoveryRange::new(slot * width + 1, (slot + 1) * width)
    })
}
