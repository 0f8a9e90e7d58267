use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// Cache entry with timestamp
#[derive(Clone)]
pub struct CacheEntry {
    pub value: String,
    pub created_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

// Bounded key -> string store with TTL expiry and oldest-entry eviction.
// Expiry is lazy: get() treats stale entries as absent, removal happens on
// the next eviction pass or a sweep().
pub struct TtlCache {
    entries: DashMap<String, CacheEntry>,
    max_size: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TtlCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_size,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(entry) = self.entries.get(key) {
            if entry.created_at.elapsed() < self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn put(&self, key: &str, value: &str) {
        while self.entries.len() >= self.max_size {
            if !self.evict_oldest() {
                break;
            }
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                created_at: Instant::now(),
            },
        );
    }

    // remove the entry with the smallest timestamp; O(n) scan is fine at
    // this scale (a few thousand entries at most)
    fn evict_oldest(&self) -> bool {
        let mut oldest: Option<(String, Instant)> = None;
        for entry in self.entries.iter() {
            match &oldest {
                Some((_, t)) if entry.created_at >= *t => {}
                _ => oldest = Some((entry.key().clone(), entry.created_at)),
            }
        }
        match oldest {
            Some((key, _)) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    // drop expired entries; returns how many were removed
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

// Generation cache key: the trained context can be large, so hash it instead
// of joining raw strings. Fields are delimited so content shifting across a
// field boundary cannot produce the same key.
pub fn generation_key(model: &str, prompt: &str, trained: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model);
    hasher.update(b"|");
    hasher.update(prompt);
    hasher.update(b"|");
    hasher.update(trained);
    format!("{:x}", hasher.finalize())
}
