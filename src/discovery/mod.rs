//! Discovery engine: probe ranges and bounded gap repair.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use puzzle_core::context::RequestContext;
//! use puzzle_core::discovery::{DiscoveryConfig, FragmentRepository};
//! use puzzle_core::fetch::ResilientFetcher;
//!
//! # async fn example(fetcher: Arc<ResilientFetcher>) {
//! let repository = FragmentRepository::new(fetcher, DiscoveryConfig::default());
//! match repository.discover(Some(10), &RequestContext::new()).await {
//!     Ok(set) => println!("{} fragments", set.total_found()),
//!     Err(e) => eprintln!("discovery failed: {e}"),
//! }
//! # }
//! ```

mod error;
mod ranges;
mod repository;
mod telemetry;

pub use error::{DiscoveryError, StallReason};
pub use ranges::{DiscoveryRange, PROBE_RANGE_COUNT, probe_ranges};
pub use repository::{
    DEFAULT_INITIAL_BATCH_SIZE, DEFAULT_MAX_MISSING_POSITIONS, DiscoveryConfig,
    FragmentRepository, GAP_FILL_WINDOW, GapKeyStrategy,
};
pub use telemetry::DiscoveryCounters;
