//! In-memory TTL layer backed by a `DashMap` and per-key expiry timers.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::trace;

use strata_core::config::cache::MemoryConfig;
use strata_core::result::AppResult;
use strata_core::traits::layer::{CacheLayer, LayerCapabilities};

use crate::keys::{MarshalledKey, marshal_key};

/// A stored value and the timer that will remove it.
///
/// `expires_at` is `None` when the deadline lies beyond what the clock can
/// represent; such an entry lives until it is overwritten or cleared.
struct MemoryEntry<V> {
    value: V,
    expires_at: Option<Instant>,
    /// Distinguishes this entry from a later one under the same key.
    generation: u64,
    timer: Option<AbortHandle>,
}

impl<V> MemoryEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }

    fn cancel_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

/// Pure-TTL in-memory layer.
///
/// Every `set` cancels the previous timer for the key before arming a new
/// one, so a stale timer can never remove a newer value. Reads also check the
/// entry's deadline, so an entry is never served at or after its expiry even
/// if its timer has not run yet.
pub struct MemoryLayer<V> {
    ttl: Duration,
    entries: Arc<DashMap<MarshalledKey, MemoryEntry<V>>>,
    next_generation: AtomicU64,
}

impl<V> MemoryLayer<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a memory layer from configuration, validating the TTL.
    pub fn new(config: &MemoryConfig) -> AppResult<Self> {
        Ok(Self::with_ttl(config.ttl()?))
    }

    /// Create a memory layer with the given TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Entry time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, including expired ones whose timer has not run yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the layer holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and cancel every timer.
    pub fn clear_all(&self) {
        self.entries.retain(|_, entry| {
            entry.cancel_timer();
            false
        });
    }

    fn lookup(&self, key: &MarshalledKey) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => return Some(entry.value.clone()),
            Some(entry) => entry.generation,
            None => return None,
        };

        if let Some((_, entry)) = self
            .entries
            .remove_if(key, |_, entry| entry.generation == expired)
        {
            entry.cancel_timer();
            trace!(key = %key, "Dropped expired memory entry on read");
        }
        None
    }

    fn store(&self, key: MarshalledKey, value: V) {
        self.evict(&key);

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let expires_at = Instant::now().checked_add(self.ttl);
        let timer = expires_at.map(|deadline| {
            let entries = Arc::downgrade(&self.entries);
            let timer_key = key.clone();
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                if let Some(entries) = entries.upgrade() {
                    if entries
                        .remove_if(&timer_key, |_, entry| entry.generation == generation)
                        .is_some()
                    {
                        trace!(key = %timer_key, "Memory entry expired");
                    }
                }
            })
            .abort_handle()
        });

        let entry = MemoryEntry {
            value,
            expires_at,
            generation,
            timer,
        };
        if let Some(displaced) = self.entries.insert(key, entry) {
            displaced.cancel_timer();
        }
    }

    fn evict(&self, key: &MarshalledKey) {
        if let Some((_, entry)) = self.entries.remove(key) {
            entry.cancel_timer();
        }
    }
}

impl<V> Drop for MemoryLayer<V> {
    fn drop(&mut self) {
        for entry in self.entries.iter() {
            entry.cancel_timer();
        }
    }
}

impl<V> fmt::Debug for MemoryLayer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLayer")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[async_trait]
impl<K, V> CacheLayer<K, V> for MemoryLayer<V>
where
    K: Serialize + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "memory"
    }

    fn capabilities(&self) -> LayerCapabilities {
        LayerCapabilities::FULL
    }

    async fn get(&self, key: &K) -> AppResult<Option<V>> {
        let key = marshal_key(key)?;
        Ok(self.lookup(&key))
    }

    async fn set(&self, key: &K, value: &V) -> AppResult<()> {
        let key = marshal_key(key)?;
        self.store(key, value.clone());
        Ok(())
    }

    async fn clear(&self, key: &K) -> AppResult<()> {
        let key = marshal_key(key)?;
        self.evict(&key);
        Ok(())
    }
}
