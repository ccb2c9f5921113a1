//! # strata-cache
//!
//! A layered read-through/write-through cache. A lookup consults an ordered
//! chain of layers (fastest first), returns the first value found, and
//! backfills the faster layers that missed.
//!
//! - **memory**: built-in pure-TTL layer, prepended to the chain unless disabled
//! - **function**: layers assembled from async closures
//! - **manager**: the [`CacheManager`] entry point with request coalescing
//!
//! Layers implement [`strata_core::traits::CacheLayer`] and always receive
//! the caller's original key; the canonical [`keys::MarshalledKey`] is used
//! only for internal bookkeeping.

pub mod chain;
pub mod function;
pub mod keys;
pub mod manager;
pub mod memory;
pub mod options;

pub use chain::{ChainLookup, LayerChain, LayerRef};
pub use function::{FnLayer, LayerFns};
pub use keys::{MarshalledKey, marshal_key, unmarshal_key};
pub use manager::CacheManager;
pub use memory::MemoryLayer;
pub use options::{CacheOptions, LayerSpec};
