//! Puzzle Solver Core Library
//!
//! Retrieves an unknown number of numbered text fragments from a remote
//! source and reassembles them into ordered text.
//!
//! # Architecture
//!
//! Data flows strictly upward through these modules:
//! - [`transport`] - Shared pooled HTTP session and the GET seam
//! - [`fetch`] - Gated, retrying fragment fetches
//! - [`discovery`] - Probe ranges and bounded gap repair
//! - [`assembly`] - Ordered text assembly and the `solve` operation
//!
//! Supporting modules:
//! - [`fragment`] - Fragment and fragment-set model
//! - [`config`] - Layered configuration
//! - [`context`] - Explicit correlation context
//! - [`runtime`] - Wiring and shutdown of the whole stack

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assembly;
pub mod config;
pub mod context;
pub mod discovery;
pub mod fetch;
pub mod fragment;
pub mod runtime;
pub mod transport;

// Re-export commonly used types
pub use assembly::{Assembler, PuzzleResult, PuzzleSolver, PuzzleStats};
pub use config::{ConfigError, SolverConfig};
pub use context::RequestContext;
pub use discovery::{DiscoveryError, FragmentRepository};
pub use fetch::{FetchError, ResilientFetcher, RetryPolicy};
pub use fragment::{Fragment, FragmentSet, estimate_fetch_key};
pub use runtime::{PuzzleRuntime, RuntimeError};
pub use transport::{ConnectionManager, Transport};
