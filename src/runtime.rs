//! Explicit construction and shutdown of the whole solver stack.
//!
//! `PuzzleRuntime::from_config` wires connection manager, transport, source,
//! fetcher, repository, and solver once; `shutdown` releases the pooled
//! session. Nothing here is global: callers own the runtime and pass
//! references down.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument};

use crate::assembly::{Assembler, PuzzleSolver};
use crate::config::SolverConfig;
use crate::discovery::FragmentRepository;
use crate::fetch::{FetcherError, JsonFragmentSource, ResilientFetcher};
use crate::transport::{ConnectionManager, HttpTransport};

/// Errors raised while wiring the stack.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The configured source URL is not a valid URL.
    #[error("invalid source url '{url}': {source}")]
    InvalidSourceUrl {
        /// The rejected URL.
        url: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },

    /// The fetcher rejected its settings.
    #[error(transparent)]
    Fetcher(#[from] FetcherError),
}

/// Owned handle on a fully wired solver.
#[derive(Debug)]
pub struct PuzzleRuntime {
    connections: Arc<ConnectionManager>,
    repository: Arc<FragmentRepository>,
    solver: PuzzleSolver,
}

impl PuzzleRuntime {
    /// Builds the stack described by `config`. No network I/O happens here;
    /// the session is created on the first fetch.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if the source URL or fetch settings are invalid.
    #[instrument(skip(config), fields(source = %config.source.full_url()))]
    pub fn from_config(config: &SolverConfig) -> Result<Self, RuntimeError> {
        let connections = Arc::new(ConnectionManager::new(config.connection.clone()));

        let request_timeout = (config.source.request_timeout_ms > 0)
            .then(|| Duration::from_millis(config.source.request_timeout_ms));
        let transport = Arc::new(HttpTransport::new(Arc::clone(&connections), request_timeout));

        let source =
            JsonFragmentSource::new(&config.source).map_err(|e| RuntimeError::InvalidSourceUrl {
                url: config.source.full_url(),
                source: e,
            })?;

        let fetcher = ResilientFetcher::new(
            transport,
            Arc::new(source),
            config.fetch.max_concurrency,
            config.fetch.retry_policy(),
        )?;

        let repository = Arc::new(FragmentRepository::new(
            Arc::new(fetcher),
            config.discovery.clone(),
        ));
        let solver = PuzzleSolver::new(
            Arc::clone(&repository),
            Assembler::new(&config.assembly),
        );

        info!(
            max_concurrency = config.fetch.max_concurrency,
            batch_size = config.discovery.initial_batch_size,
            "solver runtime ready"
        );

        Ok(Self {
            connections,
            repository,
            solver,
        })
    }

    /// The solver.
    #[must_use]
    pub fn solver(&self) -> &PuzzleSolver {
        &self.solver
    }

    /// The fragment repository.
    #[must_use]
    pub fn repository(&self) -> &FragmentRepository {
        &self.repository
    }

    /// The connection manager.
    #[must_use]
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Releases the pooled session. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.connections.release().await;
        info!("solver runtime shut down");
    }
}
