use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Table of async mutexes keyed by account (or any other identity).
///
/// Holding the guard serializes work for one key without blocking other keys.
pub struct AccountLocks<K>
where
    K: Eq + Hash,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> Default for AccountLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> AccountLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self { locks: DashMap::new() }
    }

    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        mutex.lock_owned().await
    }

    /// Removes locks nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
