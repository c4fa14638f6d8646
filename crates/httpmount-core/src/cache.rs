//! Path-indexed cache of the remote tree.
//!
//! Every path is fetched at most once. The response becomes one of three
//! [`CacheEntry`] states and stays that way for the life of the cache:
//!
//! - a listing page becomes a [`DirectoryListing`],
//! - any other 200 body becomes file content,
//! - a 404 becomes an `Absent` tombstone.
//!
//! Listing pages only show rounded sizes ("1.5M"), so when a file's body
//! arrives its exact length is written back into the parent listing. After
//! that, attributes read from the listing match what `read` returns.

use crate::error::{CacheError, CacheResult};
use crate::fetch::{Fetcher, STATUS_NOT_FOUND, STATUS_OK};
use crate::listing;
use crate::path::RemotePath;
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};
use url::Url;

/// Kind of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Directory,
    File,
}

/// One child as shown in its parent's listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Name without any trailing `/`.
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes. Approximate until the file itself has been fetched.
    pub size: u64,
    pub modified: SystemTime,
}

impl DirectoryEntry {
    /// The synthetic entry describing the mount root.
    pub fn root() -> Self {
        Self {
            name: String::new(),
            kind: EntryKind::Directory,
            size: 0,
            modified: UNIX_EPOCH,
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Children of one directory, in the order the listing page showed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    entries: IndexMap<String, DirectoryEntry>,
}

impl DirectoryListing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry keyed by its name. A repeated name keeps its original
    /// position and takes the newer value.
    pub fn insert(&mut self, entry: DirectoryEntry) -> Option<DirectoryEntry> {
        self.entries.insert(entry.name.clone(), entry)
    }

    pub fn get(&self, name: &str) -> Option<&DirectoryEntry> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrites the size of `name`. Returns false if there is no such entry.
    fn set_size(&mut self, name: &str, size: u64) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.size = size;
                true
            }
            None => false,
        }
    }
}

/// What the cache knows about one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    Listing(DirectoryListing),
    File(Bytes),
    /// The server answered 404, or served a file its parent does not list.
    Absent,
}

impl CacheEntry {
    pub fn as_listing(&self) -> Option<&DirectoryListing> {
        match self {
            CacheEntry::Listing(listing) => Some(listing),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&Bytes> {
        match self {
            CacheEntry::File(content) => Some(content),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, CacheEntry::Absent)
    }
}

/// Lazily populated map from [`RemotePath`] to [`CacheEntry`].
///
/// Owned by a single filesystem instance and accessed through `&mut self`,
/// so there is never more than one fetch in flight and no locking.
pub struct PathCache<F> {
    /// Root URL, always ending in `/`.
    root: Url,
    fetcher: F,
    entries: HashMap<RemotePath, CacheEntry>,
    fetches: u64,
}

impl<F: Fetcher> PathCache<F> {
    /// Creates an empty cache for the tree served at `root`.
    pub fn new(mut root: Url, fetcher: F) -> Self {
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        Self {
            root,
            fetcher,
            entries: HashMap::new(),
            fetches: 0,
        }
    }

    /// The root URL, with a trailing `/`.
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Number of cached paths, tombstones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of GET requests issued so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches
    }

    /// Returns the cached entry without fetching.
    pub fn peek(&self, path: &RemotePath) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    /// Builds the URL backing `path`.
    pub fn url_for(&self, path: &RemotePath) -> CacheResult<Url> {
        if path.has_traversal() {
            return Err(CacheError::InvalidPath {
                path: path.to_string(),
            });
        }
        // The "./" prefix keeps names such as "a:b" from parsing as a scheme.
        self.root
            .join(&format!("./{}", path.as_str()))
            .map_err(|source| CacheError::Url {
                path: path.to_string(),
                source,
            })
    }

    /// Returns the entry for `path`, fetching it on first access.
    ///
    /// Fails with [`CacheError::NotFound`] for tombstoned paths.
    pub fn get(&mut self, path: &RemotePath) -> CacheResult<&CacheEntry> {
        self.resolve(path, path.depth())?;
        match self.entries.get(path) {
            Some(CacheEntry::Absent) => Err(CacheError::NotFound {
                path: path.to_string(),
            }),
            Some(entry) => Ok(entry),
            None => Err(CacheError::Inconsistency {
                path: path.to_string(),
                detail: "entry missing after resolution".to_string(),
            }),
        }
    }

    /// Returns the listing at `path`, or `None` if `path` is a file.
    pub fn listing(&mut self, path: &RemotePath) -> CacheResult<Option<&DirectoryListing>> {
        Ok(self.get(path)?.as_listing())
    }

    /// Returns the attributes of `path` as recorded in its parent listing.
    ///
    /// The root has no parent and gets [`DirectoryEntry::root`]. A path whose
    /// parent is missing, is a file, or does not list it is `NotFound`.
    pub fn stat(&mut self, path: &RemotePath) -> CacheResult<DirectoryEntry> {
        if path.has_traversal() {
            return Err(CacheError::InvalidPath {
                path: path.to_string(),
            });
        }
        let Some((parent, name)) = path.split() else {
            return Ok(DirectoryEntry::root());
        };
        let not_found = || CacheError::NotFound {
            path: path.to_string(),
        };

        self.listing(&parent)
            .map_err(|e| if e.is_not_found() { not_found() } else { e })?
            .and_then(|listing| listing.get(name))
            .cloned()
            .ok_or_else(not_found)
    }

    /// Ensures `path` has an entry, fetching it if needed.
    ///
    /// `budget` bounds how many ancestors a file back-patch may resolve.
    /// Each step moves to a strictly shorter path, so the path depth is
    /// always enough.
    fn resolve(&mut self, path: &RemotePath, budget: usize) -> CacheResult<()> {
        if self.entries.contains_key(path) {
            trace!(path = %path, "cache hit");
            return Ok(());
        }

        let url = self.url_for(path)?;
        debug!(path = %path, %url, "cache miss");
        self.fetches += 1;
        let response = self.fetcher.get(&url)?;

        match response.status {
            STATUS_NOT_FOUND => {
                debug!(path = %path, "remote path not found, recording tombstone");
                self.entries.insert(path.clone(), CacheEntry::Absent);
                Ok(())
            }
            STATUS_OK if listing::is_listing(&response.body) => {
                let text = String::from_utf8_lossy(&response.body);
                let parsed = listing::parse_listing(&text).map_err(|source| {
                    CacheError::MalformedListing {
                        path: path.to_string(),
                        source,
                    }
                })?;
                debug!(path = %path, entries = parsed.len(), "cached listing");
                self.entries.insert(path.clone(), CacheEntry::Listing(parsed));
                Ok(())
            }
            STATUS_OK => self.store_file(path, response.body, budget),
            status => Err(CacheError::Status { url, status }),
        }
    }

    /// Records file content and corrects the size in the parent listing.
    ///
    /// The parent is resolved before anything is stored. A fetch failure
    /// while resolving it leaves the file uncached, so the cache never holds
    /// content whose listing entry still carries the rounded size. If the
    /// parent resolves but cannot describe the file, the path is tombstoned
    /// and only this request fails.
    fn store_file(&mut self, path: &RemotePath, body: Bytes, budget: usize) -> CacheResult<()> {
        let size = body.len() as u64;
        match self.back_patch(path, size, budget)? {
            Ok(()) => {
                debug!(path = %path, size, "cached file content");
                self.entries.insert(path.clone(), CacheEntry::File(body));
                Ok(())
            }
            Err(detail) => {
                debug!(path = %path, "unlisted file, recording tombstone");
                self.entries.insert(path.clone(), CacheEntry::Absent);
                Err(CacheError::Inconsistency {
                    path: path.to_string(),
                    detail,
                })
            }
        }
    }

    /// Writes `size` into the parent listing entry for `path`.
    ///
    /// The outer error is a failure to fetch the parent. The inner one
    /// describes a tree that contradicts itself.
    fn back_patch(
        &mut self,
        path: &RemotePath,
        size: u64,
        budget: usize,
    ) -> CacheResult<Result<(), String>> {
        let Some((parent, name)) = path.split() else {
            return Ok(Err("root URL served a file instead of a listing".to_string()));
        };
        let Some(budget) = budget.checked_sub(1) else {
            return Ok(Err("parent resolution exceeded path depth".to_string()));
        };

        self.resolve(&parent, budget)?;

        Ok(match self.entries.get_mut(&parent) {
            Some(CacheEntry::Listing(listing)) => {
                if listing.set_size(name, size) {
                    Ok(())
                } else {
                    Err(format!("parent listing '{parent}' does not contain '{name}'"))
                }
            }
            Some(CacheEntry::File(_)) => Err(format!("parent '{parent}' is a file")),
            Some(CacheEntry::Absent) | None => Err(format!("parent '{parent}' does not exist")),
        })
    }
}
