// src/rate_limit.rs

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Fixed one-minute windows per caller key.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    hits: DashMap<String, (Instant, u32)>,
}

impl RateLimiter {
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: DashMap::new(),
        }
    }

    /// Counts one request for `key`; `false` once the window's budget is spent.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.hits.entry(key.to_string()).or_insert((now, 0));
        let (started, count) = entry.value_mut();

        if now.duration_since(*started) >= self.window {
            *started = now;
            *count = 0;
        }
        if *count >= self.limit {
            return false;
        }
        *count += 1;
        true
    }

    /// Drops windows that have expired. Called opportunistically to bound memory.
    pub fn prune(&self) {
        let now = Instant::now();
        self.hits
            .retain(|_, (started, _)| now.duration_since(*started) < self.window);
    }
}
