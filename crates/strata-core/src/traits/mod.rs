//! Core traits defined in `strata-core` and implemented by other crates.

pub mod layer;

pub use layer::{CacheLayer, LayerCapabilities};
