use crate::error::ApiError;
use dashmap::DashMap;
use std::time::{Duration, Instant};

// Rate limit entry - tracks requests per client key
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
}

// Fixed-window request counter keyed by client address
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests,
            window,
        }
    }

    // allow or reject one request; rejection carries whole seconds until the
    // window resets
    pub fn check(&self, key: &str) -> Result<(), ApiError> {
        let now = Instant::now();

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_start: now,
            });

        // window expired? reset it
        if entry.window_start.elapsed() > self.window {
            entry.count = 1;
            entry.window_start = now;
            return Ok(());
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            return Ok(());
        }

        let remaining = self.window.saturating_sub(entry.window_start.elapsed());
        Err(ApiError::RateLimited {
            retry_after: remaining.as_secs_f64().ceil() as u64,
        })
    }

    // drop entries whose window has long expired, to bound memory
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        let cutoff = self.window * 2;
        self.entries
            .retain(|_, entry| entry.window_start.elapsed() < cutoff);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
