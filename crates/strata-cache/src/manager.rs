//! Cache manager: the public entry point of a layered cache.
//!
//! `get` walks the layer chain once per key no matter how many callers ask
//! for it concurrently. The first caller for a key (the leader) registers an
//! in-flight entry and spawns the walk; later callers subscribe to that entry
//! and receive the same outcome. The entry is removed the moment an outcome
//! is known, before backfill starts.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use strata_core::error::AppError;
use strata_core::result::AppResult;

use crate::chain::{ChainLookup, LayerChain};
use crate::keys::{MarshalledKey, marshal_key};
use crate::memory::MemoryLayer;
use crate::options::CacheOptions;

/// What a lookup settles to: a value, absent, or the last layer error.
type Outcome<V> = AppResult<Option<V>>;

/// A pending lookup other callers can subscribe to.
struct InFlight<V> {
    id: u64,
    outcome: watch::Receiver<Option<Outcome<V>>>,
}

/// How a caller takes part in a lookup.
enum Registration<V> {
    /// Another caller is already walking the chain for this key.
    Join(watch::Receiver<Option<Outcome<V>>>),
    /// This caller walks the chain and publishes through `sender`.
    Lead {
        id: u64,
        sender: watch::Sender<Option<Outcome<V>>>,
    },
}

struct Inner<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    chain: LayerChain<K, V>,
    memory: Option<Arc<MemoryLayer<V>>>,
    in_flight: Mutex<HashMap<MarshalledKey, InFlight<V>>>,
    next_request_id: AtomicU64,
}

/// Layered read-through/write-through cache.
///
/// Cloning is cheap; clones share layers and the in-flight table.
pub struct CacheManager<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    inner: Arc<Inner<K, V>>,
}

impl<K, V> CacheManager<K, V>
where
    K: Serialize + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Build a cache from options.
    ///
    /// Fails with a configuration error when no layers are supplied, a layer
    /// definition lacks `get`, or the memory TTL is invalid.
    pub fn new(options: impl Into<CacheOptions<K, V>>) -> AppResult<Self> {
        let normalized = options.into().normalize()?;
        info!(
            layers = ?normalized.chain.names(),
            memory = normalized.memory.is_some(),
            "Initialized layered cache"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                chain: normalized.chain,
                memory: normalized.memory,
                in_flight: Mutex::new(HashMap::new()),
                next_request_id: AtomicU64::new(0),
            }),
        })
    }

    /// Get a value from the first layer that has it.
    ///
    /// Returns `Ok(None)` when every layer misses without error, and the last
    /// layer error when no layer produced a value and at least one failed.
    pub async fn get(&self, key: &K) -> AppResult<Option<V>> {
        let marshalled = marshal_key(key)?;

        let registration = {
            let mut table = self.inner.lock_in_flight();
            match table.get(&marshalled) {
                Some(pending) => Registration::Join(pending.outcome.clone()),
                None => {
                    let id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
                    let (sender, outcome) = watch::channel(None);
                    table.insert(marshalled.clone(), InFlight { id, outcome });
                    Registration::Lead { id, sender }
                }
            }
        };

        let (id, sender) = match registration {
            Registration::Join(outcome) => {
                debug!(key = %marshalled, "Joining in-flight lookup");
                return wait_for(outcome).await;
            }
            Registration::Lead { id, sender } => (id, sender),
        };

        let inner = Arc::clone(&self.inner);
        let key = key.clone();
        let lookup = tokio::spawn(async move {
            let guard = InFlightGuard {
                inner: &inner,
                key: &marshalled,
                id,
            };
            inner.resolve(&key, &guard, sender).await
        });

        match lookup.await {
            Ok(outcome) => outcome,
            Err(e) => Err(AppError::internal(format!("cache lookup task failed: {e}"))),
        }
    }

    /// Look up several keys concurrently, each through [`get`](Self::get).
    ///
    /// Results are returned in the order of `keys`.
    pub async fn get_many(&self, keys: &[K]) -> Vec<AppResult<Option<V>>> {
        join_all(keys.iter().map(|key| self.get(key))).await
    }

    /// Write a value to every layer that supports `set`, in chain order.
    ///
    /// Layer failures are logged and skipped.
    pub async fn set(&self, key: &K, value: &V) {
        self.inner.chain.set_all(key, value).await;
    }

    /// Clear a key from every layer that supports `clear`, in chain order.
    ///
    /// Layer failures are logged and skipped.
    pub async fn clear(&self, key: &K) {
        self.inner.chain.clear_all(key).await;
    }

    /// Number of layers, including the memory layer when enabled.
    pub fn layer_count(&self) -> usize {
        self.inner.chain.len()
    }

    /// Number of keys with a lookup currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.inner.lock_in_flight().len()
    }

    /// The built-in memory layer, if enabled.
    pub fn memory(&self) -> Option<&MemoryLayer<V>> {
        self.inner.memory.as_deref()
    }

    /// The layer chain.
    pub fn chain(&self) -> &LayerChain<K, V> {
        &self.inner.chain
    }
}

impl<K, V> Inner<K, V>
where
    K: Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<MarshalledKey, InFlight<V>>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Walk the chain, publish the outcome, then backfill faster layers.
    async fn resolve(
        &self,
        key: &K,
        guard: &InFlightGuard<'_, K, V>,
        sender: watch::Sender<Option<Outcome<V>>>,
    ) -> Outcome<V> {
        match self.chain.first_hit(key).await {
            ChainLookup::Hit { index, value } => {
                guard.release();
                sender.send_replace(Some(Ok(Some(value.clone()))));

                if index > 0 {
                    self.chain.backfill(key, &value, index).await;
                }
                Ok(Some(value))
            }
            miss => {
                let outcome = miss.into_result();
                guard.release();
                sender.send_replace(Some(outcome.clone()));
                outcome
            }
        }
    }
}

/// Removes a key's in-flight entry, at the latest when the lookup task ends.
struct InFlightGuard<'a, K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    inner: &'a Inner<K, V>,
    key: &'a MarshalledKey,
    id: u64,
}

impl<K, V> InFlightGuard<'_, K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Remove the entry if it still belongs to this lookup.
    fn release(&self) {
        let mut table = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if table.get(self.key).is_some_and(|pending| pending.id == self.id) {
            table.remove(self.key);
        }
    }
}

impl<K, V> Drop for InFlightGuard<'_, K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.release();
    }
}

/// Wait for a shared lookup to publish its outcome.
async fn wait_for<V: Clone>(mut outcome: watch::Receiver<Option<Outcome<V>>>) -> Outcome<V> {
    loop {
        let current = outcome.borrow_and_update().clone();
        if let Some(settled) = current {
            return settled;
        }
        if outcome.changed().await.is_err() {
            // The lookup task ended; it may have published just before closing.
            let last = outcome.borrow().clone();
            return last.unwrap_or_else(|| Err(AppError::internal("cache lookup ended without a result")));
        }
    }
}

impl<K, V> Clone for CacheManager<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for CacheManager<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .inner
            .chain
            .layers()
            .iter()
            .map(|layer| layer.name())
            .collect();
        f.debug_struct("CacheManager")
            .field("layers", &names)
            .finish()
    }
}
