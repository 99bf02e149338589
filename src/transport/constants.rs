//! Constants for the transport module (timeouts, pooling, DNS caching).

use std::time::Duration;

/// Default overall request timeout (10 seconds).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection-establishment timeout (2 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default socket read timeout (8 seconds).
pub const READ_TIMEOUT: Duration = Duration::from_secs(8);

/// Default lifetime of a cached DNS answer (10 minutes).
pub const DNS_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default keep-alive for idle pooled connections (60 seconds).
pub const KEEPALIVE: Duration = Duration::from_secs(60);

/// Fragment bodies are JSON.
pub const ACCEPT_JSON: &str = "application/json";
