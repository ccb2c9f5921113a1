//! The ordered layer chain and its traversal primitives.
//!
//! Every operation walks the layers strictly in declared order, awaiting each
//! call before starting the next. A failing layer is logged and skipped; it
//! never stops the walk.

use std::sync::Arc;

use tracing::{debug, warn};

use strata_core::error::AppError;
use strata_core::result::AppResult;
use strata_core::traits::layer::CacheLayer;

/// Shared handle to a layer.
pub type LayerRef<K, V> = Arc<dyn CacheLayer<K, V>>;

/// Result of walking the chain for a key.
#[derive(Debug)]
pub enum ChainLookup<V> {
    /// The first layer (by position) that returned a value.
    Hit {
        /// Position of the answering layer.
        index: usize,
        /// The value it returned.
        value: V,
    },
    /// No layer returned a value.
    Miss {
        /// Error from the most recent failing layer, if any failed.
        last_error: Option<AppError>,
    },
}

impl<V> ChainLookup<V> {
    /// Collapse into the caller-facing outcome.
    pub fn into_result(self) -> AppResult<Option<V>> {
        match self {
            Self::Hit { value, .. } => Ok(Some(value)),
            Self::Miss {
                last_error: Some(err),
            } => Err(err),
            Self::Miss { last_error: None } => Ok(None),
        }
    }
}

/// Non-empty, fixed list of layers, fastest first.
#[derive(Debug)]
pub struct LayerChain<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    layers: Vec<LayerRef<K, V>>,
}

impl<K, V> LayerChain<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Build a chain; fails when `layers` is empty.
    pub fn new(layers: Vec<LayerRef<K, V>>) -> AppResult<Self> {
        if layers.is_empty() {
            return Err(AppError::configuration("no caching layers provided"));
        }
        Ok(Self { layers })
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the chain has no layers; never true once constructed.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer names in chain order.
    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.name()).collect()
    }

    /// The layers in chain order.
    pub fn layers(&self) -> &[LayerRef<K, V>] {
        &self.layers
    }

    /// Ask each layer in turn until one returns a value.
    pub async fn first_hit(&self, key: &K) -> ChainLookup<V> {
        let mut last_error = None;

        for (index, layer) in self.layers.iter().enumerate() {
            match layer.get(key).await {
                Ok(Some(value)) => {
                    debug!(layer = layer.name(), index, "Layer hit");
                    return ChainLookup::Hit { index, value };
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(layer = layer.name(), index, error = %e, "Layer get failed, trying next layer");
                    last_error = Some(e);
                }
            }
        }

        ChainLookup::Miss { last_error }
    }

    /// Write `value` into every settable layer before position `upto`.
    pub async fn backfill(&self, key: &K, value: &V, upto: usize) {
        for layer in self.layers.iter().take(upto) {
            if !layer.capabilities().set {
                continue;
            }
            match layer.set(key, value).await {
                Ok(()) => debug!(layer = layer.name(), "Backfilled layer"),
                Err(e) => warn!(layer = layer.name(), error = %e, "Backfill failed, ignoring"),
            }
        }
    }

    /// Write `value` into every settable layer.
    pub async fn set_all(&self, key: &K, value: &V) {
        for layer in &self.layers {
            if !layer.capabilities().set {
                continue;
            }
            if let Err(e) = layer.set(key, value).await {
                warn!(layer = layer.name(), error = %e, "Layer set failed, ignoring");
            }
        }
    }

    /// Clear the key from every clearable layer.
    pub async fn clear_all(&self, key: &K) {
        for layer in &self.layers {
            if !layer.capabilities().clear {
                continue;
            }
            if let Err(e) = layer.clear(key).await {
                warn!(layer = layer.name(), error = %e, "Layer clear failed, ignoring");
            }
        }
    }
}
