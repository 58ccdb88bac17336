// SPDX-License-Identifier: Apache-2.0

//! Fixed-window rate limiter keyed by client IP.
//!
//! The counter lives in an external store: INCR the key, and when this
//! increment created it (count == 1) arm a TTL of one window. The window
//! therefore resets a fixed duration after its first hit, which is not a
//! true sliding window but is cheap and good enough for abuse throttling
//! on a single form endpoint.
//!
//! Store failures fail open: a Redis outage must not block legitimate
//! applicants, and the blast radius of an unthrottled window is a handful
//! of spam mails. Failures are logged so operators still see them.

use crate::config::RateLimitConfig;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

/// Key prefix for attempt counters.
const KEY_PREFIX: &str = "rl:apply";

/// Counter store failure.
#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter store error: {0}")]
    Backend(#[from] redis::RedisError),
}

/// Atomic fixed-window counter backend.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key` and return the post-increment count. When the
    /// increment creates the key, a TTL of `window` is armed; the TTL is
    /// never extended by later increments.
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<u64, CounterError>;
}

/// Redis-backed counter store.
///
/// The connection is established lazily, at most once: concurrent first
/// callers all await the same in-flight connect rather than racing to open
/// duplicates. The resulting `ConnectionManager` is cloned per use and
/// reconnects on its own after transient failures.
pub struct RedisCounterStore {
    client: redis::Client,
    conn: OnceCell<redis::aio::ConnectionManager>,
}

impl RedisCounterStore {
    /// Create a store for the given connection URL. Does not connect yet.
    pub fn new(url: &str) -> Result<Self, CounterError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<redis::aio::ConnectionManager, CounterError> {
        let conn = self
            .conn
            .get_or_try_init(|| self.client.get_tokio_connection_manager())
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<u64, CounterError> {
        let mut conn = self.connection().await?;
        let count: u64 = conn.incr(key, 1u64).await?;
        if count == 1 {
            let _: () = conn.expire(key, window.as_secs() as usize).await?;
        }
        Ok(count)
    }
}

/// In-process counter store with the same fixed-window semantics.
///
/// Suitable for single-process deployments and tests; counters do not
/// survive restarts and are not shared across replicas.
#[derive(Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, (u64, Instant)>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> Result<u64, CounterError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(key.to_string())
            .and_modify(|(count, expires_at)| {
                if now >= *expires_at {
                    *count = 1;
                    *expires_at = now + window;
                } else {
                    *count += 1;
                }
            })
            .or_insert((1, now + window));
        Ok(entry.0)
    }
}

/// Rate limiter front-end.
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Option<Arc<dyn CounterStore>>,
}

impl RateLimiter {
    /// Create a limiter over the given store. `None` disables limiting
    /// entirely (every check passes).
    pub fn new(config: RateLimitConfig, store: Option<Arc<dyn CounterStore>>) -> Self {
        Self { config, store }
    }

    /// Record an attempt for `client_key` and decide whether it may proceed.
    ///
    /// Returns true iff the post-increment count is within the configured
    /// threshold. A store failure also returns true (fail open) after
    /// logging.
    pub async fn allow(&self, client_key: &str) -> bool {
        let Some(store) = &self.store else {
            return true;
        };

        let key = format!("{KEY_PREFIX}:{client_key}");
        match store.incr_with_expiry(&key, self.config.window()).await {
            Ok(count) => {
                let allowed = count <= u64::from(self.config.max_attempts);
                debug!(client = %client_key, count, allowed, "rate limit check");
                allowed
            }
            Err(err) => {
                warn!(client = %client_key, error = %err, "counter store unavailable, failing open");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_attempts: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(
            RateLimitConfig {
                max_attempts,
                window_secs,
            },
            Some(Arc::new(MemoryCounterStore::new())),
        )
    }

    #[tokio::test]
    async fn test_threshold_boundary() {
        let limiter = limiter(20, 600);

        for i in 0..20 {
            assert!(limiter.allow("1.2.3.4").await, "attempt {} should pass", i + 1);
        }
        assert!(!limiter.allow("1.2.3.4").await, "21st attempt should be limited");
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = limiter(1, 600);

        assert!(limiter.allow("1.1.1.1").await);
        assert!(!limiter.allow("1.1.1.1").await);
        assert!(limiter.allow("2.2.2.2").await);
    }

    #[tokio::test]
    async fn test_window_resets_after_expiry() {
        let limiter = limiter(1, 1);

        assert!(limiter.allow("1.2.3.4").await);
        assert!(!limiter.allow("1.2.3.4").await);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.allow("1.2.3.4").await, "window should have reset");
    }

    #[tokio::test]
    async fn test_no_store_always_allows() {
        let limiter = RateLimiter::new(RateLimitConfig::default(), None);
        for _ in 0..100 {
            assert!(limiter.allow("1.2.3.4").await);
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        struct BrokenStore;

        #[async_trait]
        impl CounterStore for BrokenStore {
            async fn incr_with_expiry(
                &self,
                _key: &str,
                _window: Duration,
            ) -> Result<u64, CounterError> {
                Err(CounterError::Backend(redis::RedisError::from((
                    redis::ErrorKind::IoError,
                    "connection refused",
                ))))
            }
        }

        let limiter = RateLimiter::new(RateLimitConfig::default(), Some(Arc::new(BrokenStore)));
        assert!(limiter.allow("1.2.3.4").await);
    }

    #[tokio::test]
    async fn test_fixed_window_does_not_slide() {
        // Increments after the first must not extend the TTL.
        let store = MemoryCounterStore::new();
        let window = Duration::from_millis(500);

        assert_eq!(store.incr_with_expiry("k", window).await.unwrap(), 1);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.incr_with_expiry("k", window).await.unwrap(), 2);
        tokio::time::sleep(Duration::from_millis(300)).await;
        // 600ms after the first hit: the window expired even though the
        // second hit was only 300ms ago.
        assert_eq!(store.incr_with_expiry("k", window).await.unwrap(), 1);
    }
}
