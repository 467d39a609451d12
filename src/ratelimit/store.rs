//! Counter stores backing the rate limiter.
//!
//! The limiter needs one capability: atomically increment the counter for
//! a key within its current window and read back the count plus the time
//! until the window resets. `RedisCounterStore` shares counters across
//! processes; `LocalCounterStore` keeps them in a concurrent map and is
//! both the fallback and the deterministic test backend (injected clock).

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ApiError, Result};
use crate::traits::clock::Clock;

/// Shrink the local window map when it grows past this many keys.
const MAX_LOCAL_KEYS: usize = 10_000;

/// Result of one increment: the count observed within the current window
/// and the time remaining until that window resets.
#[derive(Debug, Clone, Copy)]
pub struct WindowCount {
    pub count: u64,
    pub resets_in: Duration,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key` within a fixed window of the given
    /// length, starting a fresh window if none is active or the current
    /// one has elapsed. Increment-and-read must be atomic per key.
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount>;
}

/// Redis-backed counter store.
///
/// Uses `INCR` for the atomic count, `PEXPIRE` to bound the window on the
/// first hit, and `PTTL` for the reset time. Exactly one attempt per call
/// under a short timeout; any failure is the caller's cue to fall back.
pub struct RedisCounterStore {
    client: redis::Client,
    op_timeout: Duration,
}

impl RedisCounterStore {
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| ApiError::internal(format!("Failed to create Redis client: {}", e)))?;
        Ok(Self {
            client,
            op_timeout: Duration::from_millis(500),
        })
    }

    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount> {
        let window_ms = window.as_millis() as i64;

        let op = async {
            let mut conn = self
                .client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| ApiError::internal(format!("Redis connection failed: {}", e)))?;

            let count: i64 = redis::cmd("INCR")
                .arg(key)
                .query_async::<i64>(&mut conn)
                .await
                .map_err(|e| ApiError::internal(format!("Redis INCR failed: {}", e)))?;

            if count == 1 {
                redis::cmd("PEXPIRE")
                    .arg(key)
                    .arg(window_ms)
                    .query_async::<()>(&mut conn)
                    .await
                    .map_err(|e| ApiError::internal(format!("Redis PEXPIRE failed: {}", e)))?;
                return Ok(WindowCount {
                    count: 1,
                    resets_in: window,
                });
            }

            let ttl_ms: i64 = redis::cmd("PTTL")
                .arg(key)
                .query_async::<i64>(&mut conn)
                .await
                .map_err(|e| ApiError::internal(format!("Redis PTTL failed: {}", e)))?;

            // A key without expiry means the PEXPIRE after the first INCR
            // never landed; re-arm the window rather than letting the key
            // count forever.
            let resets_in = if ttl_ms > 0 {
                Duration::from_millis(ttl_ms as u64)
            } else {
                redis::cmd("PEXPIRE")
                    .arg(key)
                    .arg(window_ms)
                    .query_async::<()>(&mut conn)
                    .await
                    .map_err(|e| ApiError::internal(format!("Redis PEXPIRE failed: {}", e)))?;
                window
            };

            Ok(WindowCount {
                count: count.max(0) as u64,
                resets_in,
            })
        };

        tokio::time::timeout(self.op_timeout, op)
            .await
            .map_err(|_| ApiError::internal("Redis operation timed out"))?
    }
}

struct LocalWindow {
    count: u64,
    started_at: Instant,
}

/// Process-local counter store over a concurrent map.
///
/// Per-key increment-and-read happens under the map's shard lock, so
/// counts stay exact under the multi-threaded runtime. The injected clock
/// makes window arithmetic deterministic in tests.
pub struct LocalCounterStore {
    windows: DashMap<String, LocalWindow>,
    clock: Arc<dyn Clock>,
}

impl LocalCounterStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }
}

#[async_trait]
impl CounterStore for LocalCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount> {
        let now = self.clock.now();

        let result = {
            let mut entry = self.windows.entry(key.to_string()).or_insert(LocalWindow {
                count: 0,
                started_at: now,
            });

            if now.duration_since(entry.started_at) >= window {
                entry.count = 1;
                entry.started_at = now;
            } else {
                entry.count += 1;
            }

            WindowCount {
                count: entry.count,
                resets_in: window.saturating_sub(now.duration_since(entry.started_at)),
            }
        };

        // Drop expired windows occasionally so abandoned keys don't
        // accumulate without bound.
        if self.windows.len() > MAX_LOCAL_KEYS {
            self.windows
                .retain(|_, w| now.duration_since(w.started_at) < window);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;

    #[tokio::test]
    async fn test_local_store_counts_within_window() {
        let clock = Arc::new(ManualClock::new());
        let store = LocalCounterStore::new(clock.clone());
        let window = Duration::from_millis(1_000);

        for expected in 1..=5u64 {
            let hit = store.increment("k", window).await.unwrap();
            assert_eq!(hit.count, expected);
        }
    }

    #[tokio::test]
    async fn test_local_store_resets_after_window() {
        let clock = Arc::new(ManualClock::new());
        let store = LocalCounterStore::new(clock.clone());
        let window = Duration::from_millis(1_000);

        store.increment("k", window).await.unwrap();
        store.increment("k", window).await.unwrap();

        clock.advance(Duration::from_millis(1_100));
        let hit = store.increment("k", window).await.unwrap();
        assert_eq!(hit.count, 1);
        assert_eq!(hit.resets_in, window);
    }

    #[tokio::test]
    async fn test_local_store_keys_are_independent() {
        let clock = Arc::new(ManualClock::new());
        let store = LocalCounterStore::new(clock);
        let window = Duration::from_millis(1_000);

        store.increment("a", window).await.unwrap();
        store.increment("a", window).await.unwrap();
        let hit = store.increment("b", window).await.unwrap();
        assert_eq!(hit.count, 1);
    }

    #[tokio::test]
    async fn test_local_store_resets_in_shrinks() {
        let clock = Arc::new(ManualClock::new());
        let store = LocalCounterStore::new(clock.clone());
        let window = Duration::from_millis(1_000);

        store.increment("k", window).await.unwrap();
        clock.advance(Duration::from_millis(400));
        let hit = store.increment("k", window).await.unwrap();
        assert_eq!(hit.resets_in, Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_redis_store_error_on_unreachable() {
        // Nothing listens on this port; the first attempt must fail fast
        // instead of surfacing an indefinite hang.
        let store = RedisCounterStore::new("redis://127.0.0.1:1/")
            .unwrap()
            .with_timeout(Duration::from_millis(200));
        let err = store
            .increment("k", Duration::from_millis(1_000))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Redis") || err.to_string().contains("timed out"));
    }
}
