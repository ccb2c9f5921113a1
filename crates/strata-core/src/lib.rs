//! # strata-core
//!
//! Core crate for Strata. Contains the layer capability trait, the
//! configuration schemas and loader, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Strata crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
