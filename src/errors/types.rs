//! Error type definitions for the mod-curator application
//!
//! Each layer owns its error enum; `AppError` ties them together for the
//! binary. `CacheError` carries string payloads and is `Clone` because a
//! single in-flight download shares its result with every waiter.

use chrono::NaiveDate;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Catalog source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Selection history / rating store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Selection generation errors
    #[error("Curator error: {0}")]
    Curator(#[from] CuratorError),

    /// Content cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Catalog source specific errors
///
/// The external catalog is a scrape-style feed, so failures split into
/// transient ones (worth retrying later) and structural ones (the listing
/// markup no longer yields any rows at all).
#[derive(Error, Debug)]
pub enum SourceError {
    /// Transient fetch failure after exhausting the bounded retry budget
    #[error("retryable fetch failure for {url}: {message}")]
    Retryable { url: String, message: String },

    /// The source is considered structurally broken, not transient
    #[error("catalog source unavailable: {consecutive_empty} consecutive fetches yielded no parseable rows")]
    Unavailable { consecutive_empty: u32 },

    /// Listing content could not be interpreted at all
    #[error("parse error: {message}")]
    Parse { message: String },
}

/// Store layer specific errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database failures (SeaORM)
    #[error("database error: {message}")]
    Database { message: String },

    /// Record not found
    #[error("not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database {
            message: err.to_string(),
        }
    }
}

/// Selection generation errors
#[derive(Error, Debug)]
pub enum CuratorError {
    /// Too few candidates even after the broadened re-fetch; nothing was committed
    #[error(
        "insufficient candidates for {date}: picked {picked}, minimum {min}; no selection committed"
    )]
    InsufficientCandidates {
        date: NaiveDate,
        picked: usize,
        min: usize,
    },

    /// Catalog source failure that prevented generation
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Selection history store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Content cache errors
///
/// Kept cloneable so concurrent `get` calls collapsed into one download all
/// observe the identical outcome.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Download failure for a single module; the cache is left unchanged
    #[error("download failed for module {module_id}: {message}")]
    Download { module_id: u32, message: String },

    /// Failure while committing an entry to disk
    #[error("cache write failed: {message}")]
    Write { message: String },

    /// Failure while reading an existing entry
    #[error("cache read failed: {message}")]
    Read { message: String },
}
