//! DNS resolver with a time-bounded answer cache.
//!
//! The fragment source is a single host hit thousands of times per solve, so
//! answers are kept for a configurable lifetime instead of resolving per
//! connection. A zero TTL turns the cache off.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tracing::{debug, trace};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
struct CachedAnswer {
    addrs: Vec<SocketAddr>,
    resolved_at: Instant,
}

#[derive(Debug, Default)]
struct AnswerCache {
    entries: HashMap<String, CachedAnswer>,
}

/// Resolver that caches lookups for `ttl`.
#[derive(Debug, Clone)]
pub(crate) struct CachingResolver {
    ttl: Duration,
    cache: Arc<Mutex<AnswerCache>>,
}

impl CachingResolver {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Arc::new(Mutex::new(AnswerCache::default())),
        }
    }

    fn cached(&self, host: &str) -> Option<Vec<SocketAddr>> {
        lookup_fresh(&self.cache, host, self.ttl, Instant::now())
    }
}

fn lookup_fresh(
    cache: &Mutex<AnswerCache>,
    host: &str,
    ttl: Duration,
    now: Instant,
) -> Option<Vec<SocketAddr>> {
    if ttl.is_zero() {
        return None;
    }
    let guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
    let answer = guard.entries.get(host)?;
    if now.duration_since(answer.resolved_at) < ttl {
        Some(answer.addrs.clone())
    } else {
        None
    }
}

fn store(cache: &Mutex<AnswerCache>, host: String, addrs: Vec<SocketAddr>, at: Instant) {
    let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
    guard.entries.insert(
        host,
        CachedAnswer {
            addrs,
            resolved_at: at,
        },
    );
}

impl Resolve for CachingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_owned();

        if let Some(addrs) = self.cached(&host) {
            trace!(%host, "dns cache hit");
            return Box::pin(async move { Ok::<Addrs, BoxError>(Box::new(addrs.into_iter())) });
        }

        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;
        Box::pin(async move {
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .collect();
            debug!(%host, answers = addrs.len(), "resolved host");
            if !ttl.is_zero() {
                store(&cache, host, addrs.clone(), Instant::now());
            }
            Ok::<Addrs, BoxError>(Box::new(addrs.into_iter()))
        })
    }
}
