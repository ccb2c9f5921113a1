//! Convenience result type alias for Strata.

use crate::error::AppError;

/// A specialized `Result` type for Strata operations.
///
/// Layer implementations and the cache manager both speak in terms of this
/// alias, so a layer error can flow to a caller unchanged.
pub type AppResult<T> = Result<T, AppError>;
