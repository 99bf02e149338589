//! Network transport: the shared connection resource and the GET seam.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use puzzle_core::transport::{ConnectionConfig, ConnectionManager, HttpTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connections = Arc::new(ConnectionManager::new(ConnectionConfig::default()));
//! let transport = HttpTransport::new(Arc::clone(&connections), None);
//! // ... hand `transport` to a fetcher ...
//! connections.release().await;
//! # Ok(())
//! # }
//! ```

mod connection;
mod constants;
mod dns;
mod http;

pub use connection::{
    ConnectionConfig, ConnectionError, ConnectionManager, SharedSession, default_user_agent,
};
pub use http::{HttpTransport, Transport, TransportResponse};
