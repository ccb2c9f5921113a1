//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

/// Default memory layer TTL in milliseconds.
pub const DEFAULT_MEMORY_TTL_MS: f64 = 60_000.0;

/// Top-level cache configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// In-memory layer configuration.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// In-memory layer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// When `true`, no memory layer is prepended to the chain.
    #[serde(default)]
    pub disabled: bool,
    /// Time-to-live for memory entries in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: f64,
}

impl MemoryConfig {
    /// Configuration with the given TTL in milliseconds.
    pub fn with_ttl_ms(ttl_ms: f64) -> Self {
        Self {
            disabled: false,
            ttl_ms,
        }
    }

    /// Check that the TTL is finite, non-negative, and representable.
    pub fn validate(&self) -> AppResult<()> {
        self.ttl().map(|_| ())
    }

    /// The validated TTL as a [`Duration`].
    pub fn ttl(&self) -> AppResult<Duration> {
        if !self.ttl_ms.is_finite() {
            return Err(AppError::configuration(format!(
                "memory.ttl must be a finite number, got {}",
                self.ttl_ms
            )));
        }
        if self.ttl_ms < 0.0 {
            return Err(AppError::configuration(format!(
                "memory.ttl must be >= 0, got {}",
                self.ttl_ms
            )));
        }
        Duration::try_from_secs_f64(self.ttl_ms / 1000.0).map_err(|e| {
            AppError::configuration(format!(
                "memory.ttl of {}ms is out of range: {e}",
                self.ttl_ms
            ))
        })
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            ttl_ms: default_ttl_ms(),
        }
    }
}

fn default_ttl_ms() -> f64 {
    DEFAULT_MEMORY_TTL_MS
}
