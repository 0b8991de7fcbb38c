//! Ephemeral key/value cache with per-key expiry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

/// Key/value store whose entries vanish after their TTL.
///
/// Writes overwrite; every value the pipeline stores is either an idempotent
/// sentinel or a whole cached answer.
#[async_trait]
pub trait EphemeralCache: Send + Sync {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration);

    async fn exists(&self, key: &str) -> bool;

    async fn get(&self, key: &str) -> Option<String>;
}

struct CachedEntry {
    value: String,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Writes between two sweeps of expired entries.
pub const PURGE_EVERY: usize = 256;

pub const DEFAULT_MAX_ENTRIES: usize = 500_000;

/// In-process cache. Expired entries are evicted lazily on read and swept
/// every [`PURGE_EVERY`] writes. At capacity the entry closest to expiry
/// makes room for the new one.
pub struct MemoryCache {
    entries: DashMap<String, CachedEntry>,
    max_entries: usize,
    writes: AtomicUsize,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            writes: AtomicUsize::new(0),
        }
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }

    fn evict_soonest_expiring(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = victim {
            log::debug!("cache full, evicting {key}");
            self.entries.remove(&key);
        }
    }

    fn make_room(&self, key: &str) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % PURGE_EVERY == 0 {
            let purged = self.purge_expired();
            if purged > 0 {
                log::debug!("purged {purged} expired cache entries");
            }
        }
        if self.entries.len() >= self.max_entries
            && !self.entries.contains_key(key)
            && self.purge_expired() == 0
        {
            self.evict_soonest_expiring();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }
}

#[async_trait]
impl EphemeralCache for MemoryCache {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) {
        self.make_room(key);
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn exists(&self, key: &str) -> bool {
        self.live_value(key).is_some()
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.live_value(key)
    }
}
