//! Error types for cache lookups.

use crate::fetch::FetchError;
use crate::listing::ListingError;
use thiserror::Error;
use url::Url;

/// Failures from [`PathCache`](crate::cache::PathCache) lookups.
///
/// `NotFound` is an ordinary outcome. `Transport` is retryable since nothing
/// is cached for it. `MalformedListing` and `Inconsistency` indicate the
/// remote tree does not look the way it must; they fail the request that hit
/// them and leave the rest of the cache usable.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Path not found: '{path}'")]
    NotFound { path: String },

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: Url, status: u16 },

    #[error("Transport failure: {0}")]
    Transport(#[from] FetchError),

    #[error("Malformed listing at '{path}': {source}")]
    MalformedListing {
        path: String,
        #[source]
        source: ListingError,
    },

    #[error("Inconsistent remote tree at '{path}': {detail}")]
    Inconsistency { path: String, detail: String },

    #[error("Path escapes the mount root: '{path}'")]
    InvalidPath { path: String },

    #[error("Cannot build URL for '{path}': {source}")]
    Url {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }

    /// True for transport-level failures. Nothing was cached, so a later
    /// access to the same path fetches again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Status { .. } | CacheError::Transport(_))
    }

    /// True for failures that point at a broken remote tree rather than a
    /// missing path or an unreachable server.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            CacheError::MalformedListing { .. } | CacheError::Inconsistency { .. }
        )
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
