//! Construction options and their normalization into a [`LayerChain`].
//!
//! Callers may describe a cache as an explicit list of layers, a bare `get`
//! closure, or both. [`CacheOptions::normalize`] collapses every form into
//! one validated chain, prepending the memory layer unless it is disabled.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;

use strata_core::config::cache::{CacheConfig, MemoryConfig};
use strata_core::error::AppError;
use strata_core::result::AppResult;
use strata_core::traits::layer::CacheLayer;

use crate::chain::{LayerChain, LayerRef};
use crate::function::{FnLayer, GetFn, LayerFns, get_fn};
use crate::memory::MemoryLayer;

/// One entry of the `layers` option.
pub enum LayerSpec<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// A ready-made layer.
    Layer(LayerRef<K, V>),
    /// A closure definition, validated during normalization.
    Fns(LayerFns<K, V>),
}

impl<K, V> From<LayerFns<K, V>> for LayerSpec<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn from(fns: LayerFns<K, V>) -> Self {
        Self::Fns(fns)
    }
}

impl<K, V> From<LayerRef<K, V>> for LayerSpec<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn from(layer: LayerRef<K, V>) -> Self {
        Self::Layer(layer)
    }
}

/// Recognized construction options.
pub struct CacheOptions<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Ordered layers, fastest first.
    pub layers: Vec<LayerSpec<K, V>>,
    /// Shortcut lookup, appended after `layers` as a read-only layer.
    pub get: Option<GetFn<K, V>>,
    /// Memory layer settings.
    pub memory: MemoryConfig,
}

/// The fixed shape every option form normalizes to.
#[derive(Debug)]
pub struct NormalizedOptions<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Validated chain, memory layer first when enabled.
    pub chain: LayerChain<K, V>,
    /// Handle to the memory layer when enabled.
    pub memory: Option<Arc<MemoryLayer<V>>>,
}

impl<K, V> CacheOptions<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Empty options: no layers, default memory settings.
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            get: None,
            memory: MemoryConfig::default(),
        }
    }

    /// Options consisting only of a lookup closure.
    pub fn from_get<F, Fut>(f: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Option<V>>> + Send + 'static,
    {
        Self::new().with_get(f)
    }

    /// Options consisting only of a layer list.
    pub fn from_layers(layers: Vec<LayerSpec<K, V>>) -> Self {
        Self {
            layers,
            ..Self::new()
        }
    }

    /// Append a ready-made layer.
    pub fn layer(mut self, layer: impl CacheLayer<K, V>) -> Self {
        self.layers.push(LayerSpec::Layer(Arc::new(layer)));
        self
    }

    /// Append a shared layer.
    pub fn shared_layer(mut self, layer: LayerRef<K, V>) -> Self {
        self.layers.push(LayerSpec::Layer(layer));
        self
    }

    /// Append a closure-defined layer.
    pub fn layer_fns(mut self, fns: LayerFns<K, V>) -> Self {
        self.layers.push(LayerSpec::Fns(fns));
        self
    }

    /// Set the shortcut lookup closure.
    pub fn with_get<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Option<V>>> + Send + 'static,
    {
        self.get = Some(get_fn(f));
        self
    }

    /// Replace the memory layer settings.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Apply cache configuration loaded from files or the environment.
    pub fn config(self, config: &CacheConfig) -> Self {
        self.memory(config.memory.clone())
    }

    /// Turn the memory layer off.
    pub fn without_memory(mut self) -> Self {
        self.memory.disabled = true;
        self
    }
}

impl<K, V> CacheOptions<K, V>
where
    K: Serialize + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Validate the options and build the layer chain.
    ///
    /// Fails when no layers are supplied, a closure definition has no `get`,
    /// or the memory TTL is invalid.
    pub fn normalize(self) -> AppResult<NormalizedOptions<K, V>> {
        let mut layers: Vec<LayerRef<K, V>> = Vec::with_capacity(self.layers.len() + 2);

        for (index, spec) in self.layers.into_iter().enumerate() {
            let layer: LayerRef<K, V> = match spec {
                LayerSpec::Layer(layer) => layer,
                LayerSpec::Fns(fns) => Arc::new(FnLayer::try_from_fns(index, fns)?),
            };
            layers.push(layer);
        }

        if let Some(get) = self.get {
            layers.push(Arc::new(FnLayer::new("get", get)));
        }

        if layers.is_empty() {
            return Err(AppError::configuration("no caching layers provided"));
        }

        let memory = if self.memory.disabled {
            None
        } else {
            let memory = Arc::new(MemoryLayer::new(&self.memory)?);
            layers.insert(0, memory.clone() as LayerRef<K, V>);
            Some(memory)
        };

        Ok(NormalizedOptions {
            chain: LayerChain::new(layers)?,
            memory,
        })
    }
}

impl<K, V> Default for CacheOptions<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> From<Vec<LayerSpec<K, V>>> for CacheOptions<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn from(layers: Vec<LayerSpec<K, V>>) -> Self {
        Self::from_layers(layers)
    }
}

impl<K, V> From<GetFn<K, V>> for CacheOptions<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn from(get: GetFn<K, V>) -> Self {
        Self {
            get: Some(get),
            ..Self::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::error::ErrorKind;

    type Options = CacheOptions<String, String>;

    #[test]
    fn test_no_layers_rejected() {
        let err = Options::new().normalize().unwrap_err();
        assert!(err.is(ErrorKind::Configuration));
        assert_eq!(err.message, "no caching layers provided");
    }

    #[test]
    fn test_memory_alone_is_not_enough() {
        let err = Options::new()
            .memory(MemoryConfig::with_ttl_ms(1000.0))
            .normalize()
            .unwrap_err();
        assert!(err.is(ErrorKind::Configuration));
    }

    #[test]
    fn test_get_shortcut_with_memory() {
        let normalized = Options::from_get(|_key| async { Ok(None) })
            .normalize()
            .unwrap();
        assert_eq!(normalized.chain.names(), vec!["memory", "get"]);
        assert!(normalized.memory.is_some());
    }

    #[test]
    fn test_shortcut_appended_after_layers() {
        let normalized = Options::new()
            .layer_fns(LayerFns::new().named("db").with_get(|_key| async { Ok(None) }))
            .with_get(|_key| async { Ok(None) })
            .without_memory()
            .normalize()
            .unwrap();
        assert_eq!(normalized.chain.names(), vec!["db", "get"]);
        assert!(normalized.memory.is_none());
    }

    #[test]
    fn test_layer_missing_get_rejected() {
        let fns: LayerFns<String, String> = LayerFns::new().with_set(|_key, _value| async { Ok(()) });
        let err = Options::from_layers(vec![fns.into()])
            .without_memory()
            .normalize()
            .unwrap_err();
        assert_eq!(err.message, "layer 0 is missing get function");
    }

    #[test]
    fn test_invalid_ttl_rejected() {
        let err = Options::from_get(|_key| async { Ok(None) })
            .memory(MemoryConfig::with_ttl_ms(f64::INFINITY))
            .normalize()
            .unwrap_err();
        assert!(err.is(ErrorKind::Configuration));
    }

    #[test]
    fn test_from_get_fn() {
        let options: Options = get_fn(|_key: String| async { Ok(Some("v".to_string())) }).into();
        let normalized = options.without_memory().normalize().unwrap();
        assert_eq!(normalized.chain.len(), 1);
    }
}
