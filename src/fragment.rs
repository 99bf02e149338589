//! Fragment data model.
//!
//! A [`Fragment`] is one piece of puzzle text. It is fetched by an opaque
//! fetch key and ordered only by its position. A [`FragmentSet`] is the
//! deduplicated view over everything collected so far, plus the positions
//! still missing inside the observed span.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Display width of fragment text before it is elided.
const DISPLAY_TEXT_LIMIT: usize = 20;

/// One unit of puzzle text.
///
/// On the wire this is `{"id": <fetch key>, "index": <position>, "text": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Key used to retrieve this fragment from the source.
    #[serde(rename = "id")]
    pub fetch_key: i64,
    /// Place of this fragment in the final text.
    #[serde(rename = "index")]
    pub position: i64,
    /// Text payload.
    pub text: String,
}

impl Fragment {
    /// Creates a fragment.
    pub fn new(fetch_key: i64, position: i64, text: impl Into<String>) -> Self {
        Self {
            fetch_key,
            position,
            text: text.into(),
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.chars().count() > DISPLAY_TEXT_LIMIT {
            let head: String = self.text.chars().take(DISPLAY_TEXT_LIMIT).collect();
            write!(
                f,
                "Fragment({}, idx={}, text='{head}...')",
                self.fetch_key, self.position
            )
        } else {
            write!(
                f,
                "Fragment({}, idx={}, text='{}')",
                self.fetch_key, self.position, self.text
            )
        }
    }
}

/// Deduplicated fragments keyed by position, with the gaps in their span.
///
/// A set is always built from scratch over a fragment collection; it is never
/// patched in place, so `missing_positions` always reflects the collection it
/// was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentSet {
    by_position: BTreeMap<i64, Fragment>,
    missing: Vec<i64>,
}

impl FragmentSet {
    /// Builds a set from `fragments`. Later fragments overwrite earlier ones
    /// at the same position.
    ///
    /// Every missing position is materialised; check [`Self::count_missing`]
    /// first when positions come from an untrusted source.
    pub fn from_fragments<'a>(fragments: impl IntoIterator<Item = &'a Fragment>) -> Self {
        let mut by_position = BTreeMap::new();
        for fragment in fragments {
            by_position.insert(fragment.position, fragment.clone());
        }

        let missing = gaps_between(by_position.keys().copied(), usize::MAX);

        Self {
            by_position,
            missing,
        }
    }

    /// Number of positions missing inside the span of `fragments`, counted
    /// without materialising them.
    pub fn count_missing<'a>(fragments: impl IntoIterator<Item = &'a Fragment>) -> u64 {
        let positions: BTreeSet<i64> = fragments.into_iter().map(|f| f.position).collect();
        let (Some(&min), Some(&max)) = (positions.first(), positions.last()) else {
            return 0;
        };
        let span = i128::from(max) - i128::from(min) + 1;
        let found = i128::try_from(positions.len()).unwrap_or(i128::MAX);
        u64::try_from(span - found).unwrap_or(u64::MAX)
    }

    /// At most `limit` missing positions inside the span of `fragments`,
    /// ascending.
    pub fn first_missing<'a>(
        fragments: impl IntoIterator<Item = &'a Fragment>,
        limit: usize,
    ) -> Vec<i64> {
        let positions: BTreeSet<i64> = fragments.into_iter().map(|f| f.position).collect();
        gaps_between(positions.into_iter(), limit)
    }

    /// Number of distinct positions present.
    #[must_use]
    pub fn total_found(&self) -> usize {
        self.by_position.len()
    }

    /// Whether no fragment was found at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_position.is_empty()
    }

    /// Every position in `[min, max]` with no fragment, ascending.
    #[must_use]
    pub fn missing_positions(&self) -> &[i64] {
        &self.missing
    }

    /// Whether the observed span has no gaps.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Found share of the observed span, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn completion_percentage(&self) -> f64 {
        let expected = self.total_found() + self.missing.len();
        if expected == 0 {
            0.0
        } else {
            self.total_found() as f64 / expected as f64 * 100.0
        }
    }

    /// Lowest and highest position present.
    #[must_use]
    pub fn span(&self) -> Option<(i64, i64)> {
        let min = *self.by_position.keys().next()?;
        let max = *self.by_position.keys().next_back()?;
        Some((min, max))
    }

    /// Fragments in ascending position order.
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.by_position.values()
    }

    /// Fragment at `position`, if present.
    #[must_use]
    pub fn get(&self, position: i64) -> Option<&Fragment> {
        self.by_position.get(&position)
    }

    /// Consumes the set, returning fragments in ascending position order.
    #[must_use]
    pub fn into_fragments(self) -> Vec<Fragment> {
        self.by_position.into_values().collect()
    }
}

/// Walks ascending, distinct `positions` and collects up to `limit` of the
/// integers that fall between neighbours.
fn gaps_between(positions: impl Iterator<Item = i64>, limit: usize) -> Vec<i64> {
    let mut missing = Vec::new();
    let mut previous: Option<i64> = None;
    for position in positions {
        if let Some(low) = previous {
            for gap in (low + 1)..position {
                if missing.len() >= limit {
                    return missing;
                }
                missing.push(gap);
            }
        }
        previous = Some(position);
    }
    missing
}

/// Estimates the fetch key for `position` from observed `(key, position)` pairs.
///
/// Linear interpolation between the lowest- and highest-positioned samples.
/// With fewer than two samples the position itself is returned; when those
/// samples share a position, the first one's key is returned. The result is
/// truncated toward zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn estimate_fetch_key(position: i64, sample: &[Fragment]) -> i64 {
    if sample.len() < 2 {
        return position;
    }

    let mut ordered: Vec<&Fragment> = sample.iter().collect();
    ordered.sort_by_key(|fragment| fragment.position);
    let (Some(first), Some(last)) = (ordered.first(), ordered.last()) else {
        return position;
    };

    if first.position == last.position {
        return first.fetch_key;
    }

    let ratio =
        (last.fetch_key - first.fetch_key) as f64 / (last.position - first.position) as f64;
    (first.fetch_key as f64 + (position - first.position) as f64 * ratio).trunc() as i64
}
