//! Fragment repository: probe ranges, then repair gaps until the set is whole.
//!
//! # Discovery Phases
//!
//! 1. Probe: four contiguous key ranges of `batch_size` keys are fetched
//!    concurrently through the shared fetcher
//! 2. Gap fill: every position missing inside the observed span is requested
//!    again, pass after pass, until no gap remains
//!
//! The gap-fill loop is bounded. A discovery that exceeds the pass ceiling,
//! the per-gap request budget, the missing-position ceiling or the
//! wall-clock deadline ends with [`DiscoveryError::Stalled`] instead of
//! looping forever. Gap keys are sent in windows of [`GAP_FILL_WINDOW`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::Deserialize;
use tracing::{Span, debug, info, instrument, warn};

use super::error::{DiscoveryError, StallReason};
use super::ranges::probe_ranges;
use super::telemetry::DiscoveryCounters;
use crate::context::RequestContext;
use crate::fetch::ResilientFetcher;
use crate::fragment::{Fragment, FragmentSet, estimate_fetch_key};

/// Default width of each probe range.
pub const DEFAULT_INITIAL_BATCH_SIZE: u32 = 10;

/// Default ceiling on positions missing inside the observed span.
pub const DEFAULT_MAX_MISSING_POSITIONS: u64 = 10_000;

/// Gap-fill keys dispatched per batch within one pass.
pub const GAP_FILL_WINDOW: usize = 256;

/// How a gap-fill pass turns a missing position into a fetch key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapKeyStrategy {
    /// Request the position itself as the fetch key.
    #[default]
    Identity,
    /// Interpolate the key from the `(key, position)` pairs seen so far.
    Interpolated,
}

/// Discovery bounds and defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Probe range width when the caller gives none.
    pub initial_batch_size: u32,
    /// Maximum number of gap-fill passes.
    pub max_gap_fill_passes: u32,
    /// Maximum number of times one position is requested during gap fill.
    pub max_requests_per_gap: u32,
    /// Wall-clock limit for one discovery in seconds; 0 disables it.
    pub max_discovery_secs: u64,
    /// Most positions allowed to be missing inside the observed span. A source
    /// reporting a far-away position stalls discovery instead of growing the
    /// gap list without bound.
    pub max_missing_positions: u64,
    /// Key mapping used by gap fill.
    pub gap_key_strategy: GapKeyStrategy,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            initial_batch_size: DEFAULT_INITIAL_BATCH_SIZE,
            max_gap_fill_passes: 32,
            max_requests_per_gap: 8,
            max_discovery_secs: 30,
            max_missing_positions: DEFAULT_MAX_MISSING_POSITIONS,
            gap_key_strategy: GapKeyStrategy::Identity,
        }
    }
}

impl DiscoveryConfig {
    /// Discovery deadline, if one is configured.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        (self.max_discovery_secs > 0).then(|| Duration::from_secs(self.max_discovery_secs))
    }

    fn missing_sample_limit(&self) -> usize {
        usize::try_from(self.max_missing_positions).unwrap_or(usize::MAX)
    }
}

/// Working state of one discovery. Lives outside the deadline future so a
/// timed-out discovery can still report what it had.
#[derive(Debug)]
struct DiscoveryState {
    collected: Vec<Fragment>,
    passes: u32,
    requests_per_gap: HashMap<i64, u32>,
    missing_limit: usize,
}

impl DiscoveryState {
    fn new(missing_limit: usize) -> Self {
        Self {
            collected: Vec::new(),
            passes: 0,
            requests_per_gap: HashMap::new(),
            missing_limit,
        }
    }

    fn stalled(&self, reason: StallReason) -> DiscoveryError {
        span_stall(&self.collected, reason, self.passes, self.missing_limit)
    }
}

fn span_stall(
    collected: &[Fragment],
    reason: StallReason,
    passes: u32,
    missing_limit: usize,
) -> DiscoveryError {
    DiscoveryError::Stalled {
        reason,
        passes,
        missing: FragmentSet::first_missing(collected, missing_limit),
        unresolved: FragmentSet::count_missing(collected),
    }
}

/// Discovery engine over a [`ResilientFetcher`].
///
/// Holds no fragments between calls: every `discover` re-runs the full
/// probe and gap-fill sequence.
#[derive(Debug)]
pub struct FragmentRepository {
    fetcher: Arc<ResilientFetcher>,
    config: DiscoveryConfig,
    counters: DiscoveryCounters,
}

impl FragmentRepository {
    /// Creates a repository fetching through `fetcher`.
    #[must_use]
    pub fn new(fetcher: Arc<ResilientFetcher>, config: DiscoveryConfig) -> Self {
        Self {
            fetcher,
            config,
            counters: DiscoveryCounters::default(),
        }
    }

    /// The shared fetcher.
    #[must_use]
    pub fn fetcher(&self) -> &ResilientFetcher {
        &self.fetcher
    }

    /// The discovery configuration.
    #[must_use]
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Found/missing counters across all discoveries.
    #[must_use]
    pub fn counters(&self) -> &DiscoveryCounters {
        &self.counters
    }

    /// Discovers the complete fragment set.
    ///
    /// `initial_batch_size` overrides the configured probe width.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidBatchSize`] for a zero batch size and
    /// [`DiscoveryError::Stalled`] when a discovery bound is exceeded.
    #[instrument(
        name = "discover",
        skip(self, ctx),
        fields(
            correlation_id = %ctx.correlation_id(),
            batch_size,
            fragments_found,
            fragments_missing,
            elapsed_seconds,
            success
        )
    )]
    pub async fn discover(
        &self,
        initial_batch_size: Option<u32>,
        ctx: &RequestContext,
    ) -> Result<FragmentSet, DiscoveryError> {
        let started = Instant::now();
        let span = Span::current();
        let batch_size = initial_batch_size.unwrap_or(self.config.initial_batch_size);
        span.record("batch_size", batch_size);

        let result = if batch_size == 0 {
            Err(DiscoveryError::InvalidBatchSize { value: batch_size })
        } else {
            self.run_bounded(batch_size, ctx).await
        };

        let elapsed_seconds = started.elapsed().as_secs_f64();
        span.record("elapsed_seconds", elapsed_seconds);
        span.record("success", result.is_ok());

        match &result {
            Ok(set) => {
                span.record("fragments_found", set.total_found());
                span.record("fragments_missing", set.missing_positions().len());
                self.counters
                    .record_complete(set.total_found(), set.missing_positions().len());
                info!(
                    fragments_found = set.total_found(),
                    elapsed_seconds, "discovery complete"
                );
            }
            Err(DiscoveryError::Stalled {
                reason,
                passes,
                unresolved,
                ..
            }) => {
                span.record("fragments_missing", *unresolved);
                self.counters.record_stalled(*unresolved);
                warn!(
                    %reason,
                    passes,
                    missing = *unresolved,
                    elapsed_seconds,
                    "discovery stalled"
                );
            }
            Err(error) => warn!(error = %error, "discovery rejected"),
        }

        result
    }

    /// Reports whether the source answers with a fragment for key 1.
    #[instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id()))]
    pub async fn check_connectivity(&self, ctx: &RequestContext) -> bool {
        let reachable = self.fetcher.fetch_one(1, ctx).await.is_some();
        if reachable {
            info!("fragment source reachable");
        } else {
            warn!("fragment source did not return a fragment for key 1");
        }
        reachable
    }

    /// Fetches a single fragment by key.
    pub async fn fetch_fragment(&self, key: i64, ctx: &RequestContext) -> Option<Fragment> {
        self.fetcher.fetch_one(key, ctx).await
    }

    /// Fetches an explicit set of keys once, without gap filling.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Stalled`] with [`StallReason::SpanLimit`]
    /// when the fetched positions leave more gaps than the configured ceiling.
    pub async fn fetch_fragments<I>(
        &self,
        keys: I,
        ctx: &RequestContext,
    ) -> Result<FragmentSet, DiscoveryError>
    where
        I: IntoIterator<Item = i64>,
    {
        let found = self.fetcher.fetch_batch(keys, ctx).await;
        if FragmentSet::count_missing(&found) > self.config.max_missing_positions {
            return Err(span_stall(
                &found,
                StallReason::SpanLimit,
                0,
                self.config.missing_sample_limit(),
            ));
        }
        Ok(FragmentSet::from_fragments(&found))
    }

    /// Runs probe and gap fill under the configured deadline.
    async fn run_bounded(
        &self,
        batch_size: u32,
        ctx: &RequestContext,
    ) -> Result<FragmentSet, DiscoveryError> {
        let mut state = DiscoveryState::new(self.config.missing_sample_limit());

        let outcome = match self.config.deadline() {
            Some(limit) => tokio::time::timeout(limit, self.run(&mut state, batch_size, ctx))
                .await
                .ok(),
            None => Some(self.run(&mut state, batch_size, ctx).await),
        };

        outcome.unwrap_or_else(|| Err(state.stalled(StallReason::Deadline)))
    }

    async fn run(
        &self,
        state: &mut DiscoveryState,
        batch_size: u32,
        ctx: &RequestContext,
    ) -> Result<FragmentSet, DiscoveryError> {
        let probed = self.probe(batch_size, ctx).await;
        state.collected.extend(probed);

        loop {
            let unresolved = FragmentSet::count_missing(&state.collected);
            if unresolved > self.config.max_missing_positions {
                debug!(
                    unresolved,
                    ceiling = self.config.max_missing_positions,
                    "observed span too wide"
                );
                return Err(state.stalled(StallReason::SpanLimit));
            }

            let set = FragmentSet::from_fragments(&state.collected);
            if set.is_complete() {
                return Ok(set);
            }

            if state.passes >= self.config.max_gap_fill_passes {
                return Err(state.stalled(StallReason::PassLimit));
            }

            let gaps = set.missing_positions();
            if let Some(position) = gaps.iter().find(|position| {
                state.requests_per_gap.get(*position).copied().unwrap_or(0)
                    >= self.config.max_requests_per_gap
            }) {
                debug!(position = *position, "gap request budget exhausted");
                return Err(state.stalled(StallReason::GapBudget));
            }

            state.passes += 1;
            debug!(
                pass = state.passes,
                found = set.total_found(),
                gaps = gaps.len(),
                "gap-fill pass"
            );

            let keys: Vec<i64> = gaps
                .iter()
                .map(|&position| self.gap_key(position, &state.collected))
                .collect();
            for &position in gaps {
                *state.requests_per_gap.entry(position).or_default() += 1;
            }

            for window in keys.chunks(GAP_FILL_WINDOW) {
                let found = self.fetcher.fetch_batch(window.iter().copied(), ctx).await;
                state.collected.extend(found);
            }
        }
    }

    /// Fetches the four probe ranges concurrently.
    async fn probe(&self, batch_size: u32, ctx: &RequestContext) -> Vec<Fragment> {
        let ranges = probe_ranges(batch_size);
        debug!(batch_size, ranges = ?ranges.map(|r| r.to_string()), "probing ranges");

        let probes = ranges.iter().map(|range| {
            self.fetcher
                .fetch_range(range.start(), range.width(), std::convert::identity, ctx)
        });
        let found: Vec<Fragment> = join_all(probes).await.into_iter().flatten().collect();

        debug!(found = found.len(), "probe complete");
        found
    }

    fn gap_key(&self, position: i64, collected: &[Fragment]) -> i64 {
        match self.config.gap_key_strategy {
            GapKeyStrategy::Identity => position,
            GapKeyStrategy::Interpolated => estimate_fetch_key(position, collected),
        }
    }
}
