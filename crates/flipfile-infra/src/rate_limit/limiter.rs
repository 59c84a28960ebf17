use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Sharded sliding-window rate limiter keyed by client identity.
///
/// Each key retains the timestamps of its requests inside the trailing
/// window; a request is admitted only while fewer than `limit` timestamps
/// remain. Multiple shards (separate HashMaps) reduce lock contention so
/// different clients typically lock different shards.
#[derive(Clone)]
pub struct RateLimiter {
    shards: Vec<Arc<Mutex<HashMap<String, VecDeque<Instant>>>>>,
    shard_count: usize,
    limit: u32,
    window: Duration,
    max_keys: usize,
}

impl RateLimiter {
    /// Create a limiter with the default shard count (16 shards).
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_shards(limit, window, 16)
    }

    /// Create a limiter with a custom shard count for tuning under high load.
    pub fn with_shards(limit: u32, window: Duration, shard_count: usize) -> Self {
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();
        Self {
            shards,
            shard_count,
            limit,
            window,
            max_keys: 10_000,
        }
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shard_count
    }

    /// Admit or deny one request for `key`.
    ///
    /// Returns `Ok(remaining)` when admitted, or `Err(retry_after)` with the
    /// time until the oldest retained request leaves the window. The check
    /// and the timestamp append happen under one shard lock, so concurrent
    /// hits on the same key cannot admit past the limit.
    #[tracing::instrument(skip(self))]
    pub async fn admit(&self, key: &str) -> Result<u32, Duration> {
        let now = Instant::now();
        let shard = &self.shards[self.shard_index(key)];
        let mut windows = shard.lock().await;

        if windows.len() >= self.max_keys && !windows.contains_key(key) {
            Self::evict_idle(&mut windows, now, self.window);
        }

        let timestamps = windows.entry(key.to_string()).or_default();

        // Drop entries that fell out of the trailing window.
        while let Some(front) = timestamps.front() {
            if now.duration_since(*front) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.limit as usize {
            // A limit of zero admits nothing; with no oldest entry to age
            // out, the caller can only retry after a full window.
            let retry_after = match timestamps.front() {
                Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                None => self.window,
            };
            tracing::debug!(
                key = %key,
                retained = timestamps.len(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit reached, request denied"
            );
            return Err(retry_after);
        }

        timestamps.push_back(now);
        let remaining = self.limit - timestamps.len() as u32;
        tracing::trace!(key = %key, remaining, "Request admitted");
        Ok(remaining)
    }

    /// Drop keys whose whole window has elapsed, to bound memory.
    fn evict_idle(
        windows: &mut HashMap<String, VecDeque<Instant>>,
        now: Instant,
        window: Duration,
    ) {
        let before = windows.len();
        windows.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|last| now.duration_since(*last) < window)
        });
        let evicted = before - windows.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle rate-limit windows");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_admits_up_to_limit_then_denies() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));

        for i in 0..10 {
            let remaining = limiter.admit("client-a").await.expect("should admit");
            assert_eq!(remaining, 10 - 1 - i);
        }

        // 11th call within the same window is denied.
        let denied = limiter.admit("client-a").await;
        assert!(denied.is_err());
        assert!(denied.unwrap_err() <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_window_expiry_readmits() {
        let limiter = RateLimiter::new(2, Duration::from_millis(100));

        limiter.admit("client-b").await.unwrap();
        limiter.admit("client-b").await.unwrap();
        assert!(limiter.admit("client-b").await.is_err());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(limiter.admit("client-b").await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_limit_denies_everything() {
        let limiter = RateLimiter::new(0, Duration::from_secs(60));

        let denied = limiter.admit("client-z").await;
        assert_eq!(denied.unwrap_err(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.admit("client-c").await.is_ok());
        assert!(limiter.admit("client-c").await.is_err());
        assert!(limiter.admit("client-d").await.is_ok());
    }

    #[tokio::test]
    async fn test_no_double_admit_under_concurrency() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.admit("shared").await.is_ok() })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }

    #[tokio::test]
    async fn test_single_shard() {
        let limiter = RateLimiter::with_shards(1, Duration::from_secs(60), 1);

        assert!(limiter.admit("e").await.is_ok());
        assert!(limiter.admit("f").await.is_ok());
        assert!(limiter.admit("e").await.is_err());
    }
}
