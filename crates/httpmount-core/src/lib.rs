//! Core of a read-only filesystem over an HTTP server's directory listings.
//!
//! A web server that renders "Index of" pages for directories without an
//! index document exposes a browsable tree. This crate turns that tree into
//! something a filesystem layer can query:
//!
//! - [`path`]: root-relative [`RemotePath`]s, the cache key
//! - [`listing`]: strict parser for listing pages
//! - [`fetch`]: the [`Fetcher`] seam and its `reqwest` implementation
//! - [`cache`]: the fetch-once [`PathCache`] with size back-patching
//!
//! # Usage
//!
//! ```no_run
//! use httpmount_core::{HttpFetcher, PathCache, RemotePath};
//! use std::time::Duration;
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new(Some(Duration::from_secs(30)))?;
//! let mut cache = PathCache::new(Url::parse("http://mirror.example/pub/")?, fetcher);
//!
//! if let Some(listing) = cache.listing(&RemotePath::root())? {
//!     for entry in listing.iter() {
//!         println!("{} {}", entry.name, entry.size);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod fetch;
pub mod listing;
pub mod path;

/// Fixtures for exercising the cache without a network.
pub mod testing;

pub use cache::{CacheEntry, DirectoryEntry, DirectoryListing, EntryKind, PathCache};
pub use error::{CacheError, CacheResult};
pub use fetch::{FetchError, FetchResponse, Fetcher, HttpFetcher};
pub use listing::{ListingError, is_listing, parse_listing};
pub use path::RemotePath;
