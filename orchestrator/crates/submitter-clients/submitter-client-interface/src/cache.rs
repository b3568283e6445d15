use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on the number of accounts tracked at once
    pub max_accounts: usize,

    /// Idle time in seconds after which an account entry is dropped
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_accounts: 1024, ttl_seconds: 3600 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// In-memory per-account cache owned by a submitter.
///
/// Stores `(value, last_access)` pairs. Entries idle for longer than the TTL are dropped on access
/// and the least recently used ones are evicted once the cache grows past its bound.
pub struct AccountCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, (V, Instant)>,
    max_entries: usize,
    ttl: Duration,
}

impl<K, V> AccountCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self::with_limits(config.max_accounts, config.ttl())
    }

    pub fn with_limits(max_entries: usize, ttl: Duration) -> Self {
        Self { entries: DashMap::new(), max_entries: max_entries.max(1), ttl }
    }

    /// Returns the cached value and refreshes its access time. Expired entries are removed.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut expired = false;
        let value = match self.entries.get_mut(key) {
            Some(mut entry) => {
                if now.duration_since(entry.1) > self.ttl {
                    expired = true;
                    None
                } else {
                    entry.1 = now;
                    Some(entry.0.clone())
                }
            }
            None => None,
        };

        if expired {
            self.entries.remove(key);
        }
        value
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key.clone(), (value, Instant::now()));
        self.evict_if_needed(&key);
    }

    /// Applies `f` to the cached value if present. Returns whether an entry was updated.
    pub fn update<F>(&self, key: &K, f: F) -> bool
    where
        F: FnOnce(&mut V),
    {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                f(&mut entry.0);
                entry.1 = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, (value, _))| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry idle for longer than the TTL and returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, (_, last_access)| now.duration_since(*last_access) <= self.ttl);
        before.saturating_sub(self.entries.len())
    }

    // Keys are collected before removal so no shard lock is held while sorting.
    fn evict_if_needed(&self, keep: &K) {
        if self.entries.len() <= self.max_entries {
            return;
        }

        let expired = self.evict_expired();
        let current_size = self.entries.len();
        if current_size <= self.max_entries {
            debug!(expired, current_size, "account cache trimmed expired entries");
            return;
        }

        let mut by_age: Vec<(K, Instant)> = self
            .entries
            .iter()
            .filter(|entry| entry.key() != keep)
            .map(|entry| (entry.key().clone(), entry.value().1))
            .collect();
        by_age.sort_by_key(|(_, last_access)| *last_access);

        let to_remove = current_size - self.max_entries;
        for (key, _) in by_age.into_iter().take(to_remove) {
            self.entries.remove(&key);
        }
        debug!(expired, evicted = to_remove, max_entries = self.max_entries, "account cache evicted idle accounts");
    }
}
