//! Instrumented in-memory transport for concurrency and retry properties.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use puzzle_core::transport::{Transport, TransportResponse};
use puzzle_core::{FetchError, Fragment};
use url::Url;

/// Serves key `k` as position `k` and records in-flight and per-key counts.
#[derive(Debug)]
pub struct CountingTransport {
    max_key: i64,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    timeouts_first: Mutex<HashMap<i64, u32>>,
    attempts: Mutex<HashMap<i64, u32>>,
}

impl CountingTransport {
    pub fn new(max_key: i64, delay: Duration) -> Self {
        Self {
            max_key,
            delay,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            timeouts_first: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Makes `key` time out on its first `times` requests.
    pub fn timeouts_first(self, key: i64, times: u32) -> Self {
        self.timeouts_first.lock().unwrap().insert(key, times);
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn attempts(&self, key: i64) -> u32 {
        *self.attempts.lock().unwrap().get(&key).unwrap_or(&0)
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        let key: i64 = url
            .query_pairs()
            .find(|(name, _)| name == "id")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap();
        *self.attempts.lock().unwrap().entry(key).or_default() += 1;

        let timed_out = match self.timeouts_first.lock().unwrap().get_mut(&key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if timed_out {
            return Err(FetchError::timeout(url.as_str()));
        }
        if (1..=self.max_key).contains(&key) {
            let fragment = Fragment::new(key, key, format!("w{key}"));
            Ok(TransportResponse::new(200, serde_json::to_vec(&fragment).unwrap()))
        } else {
            Ok(TransportResponse::new(404, ""))
        }
    }
}
