//! HTTP transport for the path cache.
//!
//! The cache only needs "GET this URL, give me status and body", so that is
//! all [`Fetcher`] asks for. [`HttpFetcher`] is the production implementation
//! on top of a blocking `reqwest` client; tests substitute in-memory fakes.

use bytes::Bytes;
use reqwest::blocking::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Status code of a successful GET.
pub const STATUS_OK: u16 = 200;

/// Status code recorded as a permanent miss.
pub const STATUS_NOT_FOUND: u16 = 404;

/// Status and body of a completed GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failure to obtain any response at all.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed: {source}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Transport failure from a non-reqwest fetcher.
    #[error("request to {url} failed: {message}")]
    Other { url: Url, message: String },
}

/// Performs a single GET request.
///
/// Implementations must not interpret the status code; 404 handling and
/// listing detection belong to the cache.
pub trait Fetcher {
    fn get(&self, url: &Url) -> Result<FetchResponse, FetchError>;
}

impl<T: Fetcher + ?Sized> Fetcher for &T {
    fn get(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        (**self).get(url)
    }
}

impl<T: Fetcher + ?Sized> Fetcher for Box<T> {
    fn get(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        (**self).get(url)
    }
}

impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn get(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        (**self).get(url)
    }
}

/// [`Fetcher`] backed by a blocking `reqwest` client.
///
/// Must not be used from inside an async runtime; the FUSE session thread
/// is a plain OS thread, which is where this runs.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher. `timeout` bounds each request end to end; `None`
    /// lets a stalled server block the caller indefinitely.
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        // reqwest applies a default 30s timeout to blocking clients unless
        // told otherwise, so "no timeout" has to be explicit.
        builder = builder.timeout(timeout);
        let client = builder.build().map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        info!(%url, "GET");

        let classify = |source: reqwest::Error| {
            if source.is_timeout() {
                warn!(%url, "request timed out");
                FetchError::Timeout {
                    url: url.clone(),
                    source,
                }
            } else {
                FetchError::Request {
                    url: url.clone(),
                    source,
                }
            }
        };

        let response = self.client.get(url.clone()).send().map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(classify)?;
        Ok(FetchResponse { status, body })
    }
}
