use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{error::CacheResult, traits::Cache};

/// Number of inserts between sweeps of expired entries.
const SWEEP_EVERY: usize = 1024;

struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory cache implementation using DashMap for concurrent access.
///
/// Entries are only ever evicted by expiry: lazily on read, and in periodic
/// sweeps on write. Each replica keeps its own entries, so a fleet of
/// bridges behind a load balancer sees a lower hit rate than with Redis.
#[derive(Default)]
pub struct MemoryCache {
    data: Arc<DashMap<String, CacheEntry>>,
    inserts: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep_expired(&self) {
        let now = Instant::now();
        self.data.retain(|_, entry| !entry.is_expired(now));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.data.len()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = Instant::now();
        if let Some(entry) = self.data.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.data.clone()));
            }
        } else {
            return Ok(None);
        }

        // Expired: drop it, unless a writer replaced it in the meantime
        self.data.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        if self.inserts.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep_expired();
        }

        self.data.insert(
            key.to_string(),
            CacheEntry {
                data: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
