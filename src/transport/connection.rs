//! Lifecycle of the one pooled HTTP session shared by every fetch.
//!
//! The [`ConnectionManager`] is an explicitly constructed, owned handle. It is
//! created once at process start, passed by reference (usually inside an
//! `Arc`) to the transport, and shut down with [`ConnectionManager::release`].
//! There is no global instance.
//!
//! # Creation
//!
//! [`ConnectionManager::acquire`] uses double-checked locking: the fast path
//! reads the current session under a shared read guard and returns it if it is
//! open; the slow path takes the async creation mutex, checks again, and only
//! then builds a new client. Concurrent callers racing on an empty slot build
//! exactly one session.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::constants::{
    ACCEPT_JSON, CONNECT_TIMEOUT, DNS_CACHE_TTL, KEEPALIVE, READ_TIMEOUT, REQUEST_TIMEOUT,
};
use super::dns::CachingResolver;

/// Errors raised while building the pooled session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The HTTP client builder rejected the configuration.
    #[error("failed to build HTTP session: {source}")]
    Build {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

/// Transport knobs for the pooled session.
///
/// Every request is bounded by the overall, connect, and read timeouts at the
/// same time; whichever is tightest for the current phase fires first.
/// Connection counts are not limited here: the fetcher's admission gate is the
/// only backpressure in the system.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Overall per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Connection-establishment timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    pub read_timeout_secs: u64,
    /// How long a resolved address stays cached (0 disables caching).
    pub dns_cache_ttl_secs: u64,
    /// Idle keep-alive for pooled connections in seconds.
    pub keepalive_secs: u64,
    /// User-Agent sent with every request.
    pub user_agent: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: REQUEST_TIMEOUT.as_secs(),
            connect_timeout_secs: CONNECT_TIMEOUT.as_secs(),
            read_timeout_secs: READ_TIMEOUT.as_secs(),
            dns_cache_ttl_secs: DNS_CACHE_TTL.as_secs(),
            keepalive_secs: KEEPALIVE.as_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ConnectionConfig {
    /// Overall request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// DNS cache lifetime.
    #[must_use]
    pub fn dns_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dns_cache_ttl_secs)
    }

    /// Keep-alive duration.
    #[must_use]
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

/// Default User-Agent (identifies the tool and version).
#[must_use]
pub fn default_user_agent() -> String {
    format!("puzzle-solver/{}", env!("CARGO_PKG_VERSION"))
}

/// A ready-to-use handle on the pooled session.
///
/// Cloning is cheap; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct SharedSession {
    client: Client,
    closed: Arc<AtomicBool>,
}

impl SharedSession {
    fn build(config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .pool_max_idle_per_host(usize::MAX)
            .pool_idle_timeout(Some(config.keepalive()))
            .tcp_keepalive(Some(config.keepalive()))
            .dns_resolver(Arc::new(CachingResolver::new(config.dns_cache_ttl())))
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .gzip(true)
            .build()
            .map_err(|source| ConnectionError::Build { source })?;

        Ok(Self {
            client,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The underlying HTTP client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Whether [`ConnectionManager::release`] has closed this session.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Owner of the shared session.
#[derive(Debug)]
pub struct ConnectionManager {
    config: ConnectionConfig,
    slot: RwLock<Option<SharedSession>>,
    create_lock: Mutex<()>,
    sessions_created: AtomicUsize,
}

impl ConnectionManager {
    /// Creates a manager; no session is built until the first [`acquire`](Self::acquire).
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            slot: RwLock::new(None),
            create_lock: Mutex::new(()),
            sessions_created: AtomicUsize::new(0),
        }
    }

    /// The transport configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Number of sessions built over this manager's lifetime.
    #[must_use]
    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    /// Whether an open session currently exists.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.current_open().is_some()
    }

    /// Returns the open session, building it first if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Build`] if the client cannot be constructed.
    pub async fn acquire(&self) -> Result<SharedSession, ConnectionError> {
        if let Some(session) = self.current_open() {
            return Ok(session);
        }

        let _guard = self.create_lock.lock().await;
        if let Some(session) = self.current_open() {
            return Ok(session);
        }

        debug!(
            request_timeout_secs = self.config.request_timeout_secs,
            connect_timeout_secs = self.config.connect_timeout_secs,
            read_timeout_secs = self.config.read_timeout_secs,
            "creating HTTP session"
        );
        let session = SharedSession::build(&self.config)?;
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        self.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(session)
    }

    /// Closes the session. Safe to call repeatedly or before any `acquire`.
    ///
    /// Requests already holding a clone finish normally; the pool is torn down
    /// once the last clone is dropped.
    #[instrument(skip(self))]
    pub async fn release(&self) {
        let _guard = self.create_lock.lock().await;
        let taken = self
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match taken {
            Some(session) if !session.is_closed() => {
                session.close();
                info!("HTTP session closed");
            }
            _ => debug!("no open HTTP session to close"),
        }
    }

    fn current_open(&self) -> Option<SharedSession> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|session| !session.is_closed())
            .cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.read_timeout(), Duration::from_secs(8));
        assert_eq!(config.dns_cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.keepalive(), Duration::from_secs(60));
        assert!(config.user_agent.starts_with("puzzle-solver/"));
    }

    #[tokio::test]
    async fn test_acquire_creates_session_once() {
        let manager = ConnectionManager::new(ConnectionConfig::default());
        assert!(!manager.is_open());

        let first = manager.acquire().await.unwrap();
        let second = manager.acquire().await.unwrap();

        assert!(!first.is_closed());
        assert!(!second.is_closed());
        assert_eq!(manager.sessions_created(), 1);
        assert!(manager.is_open());
    }

    #[tokio::test]
    async fn test_concurrent_acquire_builds_single_session() {
        let manager = ConnectionManager::new(ConnectionConfig::default());

        let acquisitions = (0..32).map(|_| manager.acquire());
        let sessions = futures_util::future::join_all(acquisitions).await;

        assert!(sessions.iter().all(Result::is_ok));
        assert_eq!(manager.sessions_created(), 1);
    }

    #[tokio::test]
    async fn test_release_without_session_is_noop() {
        let manager = ConnectionManager::new(ConnectionConfig::default());
        manager.release().await;
        manager.release().await;
        assert!(!manager.is_open());
        assert_eq!(manager.sessions_created(), 0);
    }

    #[tokio::test]
    async fn test_release_closes_and_acquire_rebuilds() {
        let manager = ConnectionManager::new(ConnectionConfig::default());
        let session = manager.acquire().await.unwrap();

        manager.release().await;
        assert!(session.is_closed());
        assert!(!manager.is_open());

        manager.release().await;

        let fresh = manager.acquire().await.unwrap();
        assert!(!fresh.is_closed());
        assert_eq!(manager.sessions_created(), 2);
    }
}
