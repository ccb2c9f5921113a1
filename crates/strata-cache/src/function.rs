//! Layers assembled from async closures.
//!
//! [`LayerFns`] is the loosely-shaped form a caller may hand over (any of the
//! three operations may be missing); [`FnLayer`] is the validated layer built
//! from it, which always has a `get`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use strata_core::error::AppError;
use strata_core::result::AppResult;
use strata_core::traits::layer::{CacheLayer, LayerCapabilities};

/// Boxed `get` operation.
pub type GetFn<K, V> = Arc<dyn Fn(K) -> BoxFuture<'static, AppResult<Option<V>>> + Send + Sync>;

/// Boxed `set` operation.
pub type SetFn<K, V> = Arc<dyn Fn(K, V) -> BoxFuture<'static, AppResult<()>> + Send + Sync>;

/// Boxed `clear` operation.
pub type ClearFn<K> = Arc<dyn Fn(K) -> BoxFuture<'static, AppResult<()>> + Send + Sync>;

/// Box an async closure as a [`GetFn`].
pub fn get_fn<K, V, F, Fut>(f: F) -> GetFn<K, V>
where
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<Option<V>>> + Send + 'static,
{
    Arc::new(move |key| Box::pin(f(key)))
}

/// Box an async closure as a [`SetFn`].
pub fn set_fn<K, V, F, Fut>(f: F) -> SetFn<K, V>
where
    F: Fn(K, V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    Arc::new(move |key, value| Box::pin(f(key, value)))
}

/// Box an async closure as a [`ClearFn`].
pub fn clear_fn<K, F, Fut>(f: F) -> ClearFn<K>
where
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    Arc::new(move |key| Box::pin(f(key)))
}

/// Unvalidated set of layer operations.
pub struct LayerFns<K, V> {
    /// Optional display name.
    pub name: Option<String>,
    /// Lookup operation; required for the layer to be usable.
    pub get: Option<GetFn<K, V>>,
    /// Write operation.
    pub set: Option<SetFn<K, V>>,
    /// Invalidation operation.
    pub clear: Option<ClearFn<K>>,
}

impl<K, V> LayerFns<K, V> {
    /// An empty definition.
    pub fn new() -> Self {
        Self {
            name: None,
            get: None,
            set: None,
            clear: None,
        }
    }

    /// Set the display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the lookup operation.
    pub fn with_get<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Option<V>>> + Send + 'static,
    {
        self.get = Some(get_fn(f));
        self
    }

    /// Set the write operation.
    pub fn with_set<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(K, V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        self.set = Some(set_fn(f));
        self
    }

    /// Set the invalidation operation.
    pub fn with_clear<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        self.clear = Some(clear_fn(f));
        self
    }
}

impl<K, V> Default for LayerFns<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A layer whose operations are closures.
pub struct FnLayer<K, V> {
    name: String,
    get: GetFn<K, V>,
    set: Option<SetFn<K, V>>,
    clear: Option<ClearFn<K>>,
}

impl<K, V> FnLayer<K, V> {
    /// A read-only layer from a single lookup closure.
    pub fn new(name: impl Into<String>, get: GetFn<K, V>) -> Self {
        Self {
            name: name.into(),
            get,
            set: None,
            clear: None,
        }
    }

    /// Validate a definition; `index` identifies the layer in error messages.
    pub fn try_from_fns(index: usize, fns: LayerFns<K, V>) -> AppResult<Self> {
        let get = fns.get.ok_or_else(|| {
            AppError::configuration(format!("layer {index} is missing get function"))
        })?;

        Ok(Self {
            name: fns.name.unwrap_or_else(|| format!("layer-{index}")),
            get,
            set: fns.set,
            clear: fns.clear,
        })
    }
}

impl<K, V> fmt::Debug for FnLayer<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLayer")
            .field("name", &self.name)
            .field("set", &self.set.is_some())
            .field("clear", &self.clear.is_some())
            .finish()
    }
}

#[async_trait]
impl<K, V> CacheLayer<K, V> for FnLayer<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> LayerCapabilities {
        LayerCapabilities {
            set: self.set.is_some(),
            clear: self.clear.is_some(),
        }
    }

    async fn get(&self, key: &K) -> AppResult<Option<V>> {
        (self.get)(key.clone()).await
    }

    async fn set(&self, key: &K, value: &V) -> AppResult<()> {
        match &self.set {
            Some(set) => set(key.clone(), value.clone()).await,
            None => Err(AppError::not_implemented(format!(
                "layer '{}' does not support set",
                self.name
            ))),
        }
    }

    async fn clear(&self, key: &K) -> AppResult<()> {
        match &self.clear {
            Some(clear) => clear(key.clone()).await,
            None => Err(AppError::not_implemented(format!(
                "layer '{}' does not support clear",
                self.name
            ))),
        }
    }
}
