//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use strata_cache::marshal_key;
use strata_core::error::AppError;
use strata_core::result::AppResult;
use strata_core::traits::layer::{CacheLayer, LayerCapabilities};

/// In-memory layer with no expiry that counts every call.
///
/// When built with [`TestLayer::failing`], every operation returns the given
/// error (after counting the call).
#[derive(Debug)]
pub struct TestLayer<K> {
    name: String,
    storage: Mutex<HashMap<String, String>>,
    error: Option<AppError>,
    set_delay: Duration,
    capabilities: LayerCapabilities,
    get_count: AtomicUsize,
    set_count: AtomicUsize,
    clear_count: AtomicUsize,
    last_key: Mutex<Option<K>>,
}

impl<K> TestLayer<K>
where
    K: Serialize + Clone + Send + Sync + 'static,
{
    /// A healthy layer with get, set, and clear.
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self::build(name, None, Duration::ZERO, LayerCapabilities::FULL))
    }

    /// A layer whose every call fails with `message`.
    pub fn failing(name: &str, message: &str) -> Arc<Self> {
        Arc::new(Self::build(
            name,
            Some(AppError::layer(message)),
            Duration::ZERO,
            LayerCapabilities::FULL,
        ))
    }

    /// A healthy layer whose writes take `delay` to complete.
    pub fn slow_writes(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(name, None, delay, LayerCapabilities::FULL))
    }

    /// A healthy layer that only exposes get.
    pub fn read_only(name: &str) -> Arc<Self> {
        Arc::new(Self::build(
            name,
            None,
            Duration::ZERO,
            LayerCapabilities::GET_ONLY,
        ))
    }

    fn build(
        name: &str,
        error: Option<AppError>,
        set_delay: Duration,
        capabilities: LayerCapabilities,
    ) -> Self {
        Self {
            name: name.to_string(),
            storage: Mutex::new(HashMap::new()),
            error,
            set_delay,
            capabilities,
            get_count: AtomicUsize::new(0),
            set_count: AtomicUsize::new(0),
            clear_count: AtomicUsize::new(0),
            last_key: Mutex::new(None),
        }
    }

    /// Seed a value directly, bypassing the counters.
    pub fn seed(&self, key: &K, value: &str) {
        let key = marshal_key(key).unwrap().to_string();
        self.storage.lock().unwrap().insert(key, value.to_string());
    }

    /// Read a value directly, bypassing the counters.
    pub fn peek(&self, key: &K) -> Option<String> {
        let key = marshal_key(key).unwrap().to_string();
        self.storage.lock().unwrap().get(&key).cloned()
    }

    pub fn get_count(&self) -> usize {
        self.get_count.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.set_count.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clear_count.load(Ordering::SeqCst)
    }

    /// The most recent key any operation received.
    pub fn last_key(&self) -> Option<K> {
        self.last_key.lock().unwrap().clone()
    }

    fn record(&self, key: &K) -> AppResult<String> {
        *self.last_key.lock().unwrap() = Some(key.clone());
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(marshal_key(key)?.to_string()),
        }
    }
}

#[async_trait]
impl<K> CacheLayer<K, String> for TestLayer<K>
where
    K: Serialize + Clone + Send + Sync + std::fmt::Debug + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> LayerCapabilities {
        self.capabilities
    }

    async fn get(&self, key: &K) -> AppResult<Option<String>> {
        self.get_count.fetch_add(1, Ordering::SeqCst);
        let key = self.record(key)?;
        Ok(self.storage.lock().unwrap().get(&key).cloned())
    }

    async fn set(&self, key: &K, value: &String) -> AppResult<()> {
        self.set_count.fetch_add(1, Ordering::SeqCst);
        let key = self.record(key)?;
        if !self.set_delay.is_zero() {
            tokio::time::sleep(self.set_delay).await;
        }
        self.storage.lock().unwrap().insert(key, value.clone());
        Ok(())
    }

    async fn clear(&self, key: &K) -> AppResult<()> {
        self.clear_count.fetch_add(1, Ordering::SeqCst);
        let key = self.record(key)?;
        self.storage.lock().unwrap().remove(&key);
        Ok(())
    }
}
