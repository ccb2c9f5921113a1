//! Built-in in-memory TTL layer.

pub mod store;

pub use store::MemoryLayer;
