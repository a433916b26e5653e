//! Short-lived response cache.
//!
//! Entries are not checked on access; a background sweep removes them once
//! their TTL has passed.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Concurrent map whose entries are dropped by [`ExpiringCache::sweep`].
pub struct ExpiringCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove entries older than the TTL.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.inserted_at) <= self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Background task sweeping expired cache entries.
pub async fn sweep_task<K, V>(cache: Arc<ExpiringCache<K, V>>, interval: Duration)
where
    K: Eq + Hash,
    V: Clone,
{
    let mut sweep_interval = tokio::time::interval(interval);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep_interval.tick().await;
        let removed = cache.sweep();
        if removed > 0 {
            debug!(removed = removed, "Swept expired cache entries");
        }
    }
}
