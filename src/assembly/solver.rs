//! Solve: discover, assemble, and report, with every failure as a value.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tracing::{Span, error, info, instrument, warn};

use super::assembler::Assembler;
use super::result::{PuzzleResult, PuzzleStats};
use crate::context::RequestContext;
use crate::discovery::FragmentRepository;

/// Message carried by a solve that found nothing.
pub const EMPTY_RESULT_MESSAGE: &str = "no fragments discovered";

/// Top-level solver over a [`FragmentRepository`] and an [`Assembler`].
#[derive(Debug)]
pub struct PuzzleSolver {
    repository: Arc<FragmentRepository>,
    assembler: Assembler,
}

impl PuzzleSolver {
    /// Creates a solver.
    #[must_use]
    pub fn new(repository: Arc<FragmentRepository>, assembler: Assembler) -> Self {
        Self {
            repository,
            assembler,
        }
    }

    /// The repository used for discovery.
    #[must_use]
    pub fn repository(&self) -> &FragmentRepository {
        &self.repository
    }

    /// Runs a full discovery and assembles the text.
    ///
    /// Never fails: discovery errors, panics, and an empty source all come
    /// back as a [`PuzzleResult`] with `error` set. `total_requests` is the
    /// fetcher's attempt count across the call, so concurrent solves over one
    /// fetcher see each other's requests.
    #[instrument(
        name = "solve",
        skip(self, ctx),
        fields(
            correlation_id = %ctx.correlation_id(),
            batch_size = self.repository.config().initial_batch_size,
            fragments_found,
            fragments_missing,
            elapsed_seconds,
            success
        )
    )]
    pub async fn solve(&self, chunk_threshold: Option<usize>, ctx: &RequestContext) -> PuzzleResult {
        let started = Instant::now();
        let span = Span::current();
        let requests_before = self.repository.fetcher().stats().attempts();

        let discovered = AssertUnwindSafe(self.repository.discover(None, ctx))
            .catch_unwind()
            .await;

        let elapsed_seconds = started.elapsed().as_secs_f64();
        let total_requests = self
            .repository
            .fetcher()
            .stats()
            .attempts()
            .saturating_sub(requests_before);

        let result = match discovered {
            Err(panic) => {
                let message = format!("discovery panicked: {}", panic_message(panic.as_ref()));
                error!(%message, "solve failed");
                PuzzleResult::failure(message, elapsed_seconds, total_requests)
            }
            Ok(Err(discovery_error)) => {
                warn!(error = %discovery_error, "solve failed");
                PuzzleResult::failure(discovery_error.to_string(), elapsed_seconds, total_requests)
            }
            Ok(Ok(set)) if set.is_empty() => {
                warn!("solve found no fragments");
                PuzzleResult::failure(EMPTY_RESULT_MESSAGE, elapsed_seconds, total_requests)
            }
            Ok(Ok(set)) => {
                let stats = PuzzleStats::from_set(&set, elapsed_seconds, total_requests);
                let text = self.assembler.assemble(&set.into_fragments(), chunk_threshold);
                info!(
                    fragments_found = stats.total_found,
                    chars = text.len(),
                    elapsed_seconds,
                    "puzzle solved"
                );
                PuzzleResult::success(text, elapsed_seconds, stats)
            }
        };

        span.record("elapsed_seconds", result.elapsed_seconds);
        span.record("fragments_found", result.stats.total_found);
        span.record("fragments_missing", result.stats.missing_count);
        span.record("success", !result.is_error());
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
