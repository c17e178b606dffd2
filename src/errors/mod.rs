//! Error handling module
//!
//! Layered error types for the curation service, with a top-level
//! `AppError` umbrella used by the binary.

pub mod types;

pub use types::{AppError, CacheError, CuratorError, SourceError, StoreError};

/// Convenient result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for catalog source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
