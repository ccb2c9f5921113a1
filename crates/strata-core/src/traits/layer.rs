//! Capability contract for one tier of a layered cache.

use async_trait::async_trait;

use crate::error::AppError;
use crate::result::AppResult;

/// Optional operations a layer exposes beyond `get`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerCapabilities {
    /// The layer accepts writes (`set`), including backfill.
    pub set: bool,
    /// The layer can drop its state for a key (`clear`).
    pub clear: bool,
}

impl LayerCapabilities {
    /// Read-only layer.
    pub const GET_ONLY: Self = Self {
        set: false,
        clear: false,
    };

    /// Layer exposing `get`, `set`, and `clear`.
    pub const FULL: Self = Self {
        set: true,
        clear: true,
    };
}

/// One tier of storage or lookup in a layered cache.
///
/// Layers always receive the caller's original key, never the internal
/// marshalled form. `get` is required; `set` and `clear` are only invoked
/// when [`capabilities`](Self::capabilities) advertises them.
#[async_trait]
pub trait CacheLayer<K, V>: Send + Sync + std::fmt::Debug + 'static
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Which optional operations this layer exposes.
    fn capabilities(&self) -> LayerCapabilities {
        LayerCapabilities::GET_ONLY
    }

    /// Look up a key. `Ok(None)` means the layer does not have it.
    async fn get(&self, key: &K) -> AppResult<Option<V>>;

    /// Store a value for a key.
    async fn set(&self, _key: &K, _value: &V) -> AppResult<()> {
        Err(AppError::not_implemented(format!(
            "layer '{}' does not support set",
            self.name()
        )))
    }

    /// Drop any state this layer holds for a key.
    async fn clear(&self, _key: &K) -> AppResult<()> {
        Err(AppError::not_implemented(format!(
            "layer '{}' does not support clear",
            self.name()
        )))
    }
}
