//! Path-based filesystem operations over the [`PathCache`].
//!
//! [`HttpFs`] answers every operation the kernel can send in terms of
//! [`RemotePath`]s, enforcing the read-only policy. Inode bookkeeping and
//! reply plumbing stay in [`crate::filesystem`], which keeps this layer
//! testable without a kernel.
//!
//! Every public operation goes through [`traced`], which records its
//! outcome. Negative answers are logged at `debug`, transport failures at
//! `warn`, and a broken remote tree at `error`.

use crate::attr::{Attr, StatFs};
use crate::error::{FsError, FsResult};
use crate::handles::{HandleTable, OpenFile};
use bytes::Bytes;
use httpmount_core::{CacheEntry, EntryKind, Fetcher, PathCache, RemotePath};
use tracing::{debug, error, warn};
use url::Url;

/// Large-file open flag as the kernel passes it on Linux. Carries no meaning
/// for an in-memory read.
pub const O_LARGEFILE: i32 = 0o100_000;

/// Open flags that imply modifying the file.
const WRITE_FLAGS: i32 = libc::O_TRUNC | libc::O_APPEND | libc::O_CREAT | libc::O_EXCL;

/// One name returned by `readdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirItem {
    pub name: String,
    pub kind: EntryKind,
}

impl DirItem {
    fn dir(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: EntryKind::Directory,
        }
    }
}

/// Runs one operation and logs its outcome.
fn traced<T>(op: &'static str, path: &RemotePath, f: impl FnOnce() -> FsResult<T>) -> FsResult<T> {
    let result = f();
    match &result {
        Ok(_) => debug!(op, path = %path, "ok"),
        Err(e) if e.is_integrity_failure() => error!(op, path = %path, error = %e, "remote tree is inconsistent"),
        Err(FsError::Cache(e)) if e.is_retryable() => warn!(op, path = %path, error = %e, "fetch failed"),
        Err(e) => debug!(op, path = %path, errno = e.to_errno(), error = %e, "failed"),
    }
    result
}

/// Read-only view of an HTTP tree.
pub struct HttpFs<F> {
    cache: PathCache<F>,
    handles: HandleTable,
    uid: u32,
    gid: u32,
}

impl<F: Fetcher> HttpFs<F> {
    /// Creates a filesystem over the tree at `root`, reporting every entry
    /// as owned by `uid:gid`.
    pub fn new(root: Url, fetcher: F, uid: u32, gid: u32) -> Self {
        Self {
            cache: PathCache::new(root, fetcher),
            handles: HandleTable::new(),
            uid,
            gid,
        }
    }

    /// The underlying cache.
    pub fn cache(&self) -> &PathCache<F> {
        &self.cache
    }

    /// Path an open handle was created for.
    pub fn handle_path(&self, fh: u64) -> FsResult<RemotePath> {
        self.handles
            .get(fh)
            .map(|file| file.path.clone())
            .ok_or(FsError::InvalidHandle(fh))
    }

    /// Number of files currently open.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    fn attr(&mut self, path: &RemotePath) -> FsResult<Attr> {
        let entry = self.cache.stat(path).map_err(|e| {
            if e.is_not_found() {
                FsError::NotFound(path.to_string())
            } else {
                FsError::Cache(e)
            }
        })?;
        Ok(Attr::from_entry(&entry, self.uid, self.gid))
    }

    fn content(&mut self, path: &RemotePath) -> FsResult<&CacheEntry> {
        self.cache.get(path).map_err(|e| {
            if e.is_not_found() {
                FsError::NotFound(path.to_string())
            } else {
                FsError::Cache(e)
            }
        })
    }

    /// Checks `mask` (`R_OK`, `W_OK`, `X_OK` bits) against `path`.
    pub fn access(&mut self, path: &RemotePath, mask: i32) -> FsResult<()> {
        traced("access", path, || {
            if mask & libc::W_OK != 0 {
                return Err(FsError::ReadOnly);
            }
            let attr = self.attr(path)?;
            if mask & libc::X_OK != 0 && !attr.is_dir() {
                return Err(FsError::PermissionDenied(path.to_string()));
            }
            Ok(())
        })
    }

    /// Attributes of `path`, taken from its parent's listing.
    pub fn getattr(&mut self, path: &RemotePath) -> FsResult<Attr> {
        traced("getattr", path, || self.attr(path))
    }

    /// `.`, `..`, then the children of `path` in listing order.
    pub fn readdir(&mut self, path: &RemotePath) -> FsResult<Vec<DirItem>> {
        traced("readdir", path, || match self.content(path)? {
            CacheEntry::Listing(listing) => {
                let mut items = Vec::with_capacity(listing.len() + 2);
                items.push(DirItem::dir("."));
                items.push(DirItem::dir(".."));
                items.extend(listing.iter().map(|entry| DirItem {
                    name: entry.name.clone(),
                    kind: entry.kind,
                }));
                Ok(items)
            }
            _ => Err(FsError::NotADirectory(path.to_string())),
        })
    }

    /// Opens `path` for reading and returns a new handle.
    ///
    /// Only a write access mode or a flag that would modify the file is
    /// refused. Flags such as `O_NONBLOCK` or `O_NOFOLLOW` are accepted.
    pub fn open(&mut self, path: &RemotePath, flags: i32) -> FsResult<u64> {
        traced("open", path, || {
            let flags = flags & !O_LARGEFILE;
            if flags & libc::O_ACCMODE != libc::O_RDONLY || flags & WRITE_FLAGS != 0 {
                return Err(FsError::ReadOnly);
            }
            if self.content(path)?.as_listing().is_some() {
                return Err(FsError::IsADirectory(path.to_string()));
            }
            Ok(self.handles.insert(OpenFile { path: path.clone() }))
        })
    }

    /// Up to `size` bytes of `path` starting at `offset`. Empty past the end.
    pub fn read(&mut self, path: &RemotePath, size: u32, offset: u64) -> FsResult<Bytes> {
        traced("read", path, || match self.content(path)? {
            CacheEntry::File(content) => {
                let len = content.len();
                let start = usize::try_from(offset).map_or(len, |o| o.min(len));
                let size = usize::try_from(size).unwrap_or(usize::MAX);
                let end = start.saturating_add(size).min(len);
                Ok(content.slice(start..end))
            }
            _ => Err(FsError::IsADirectory(path.to_string())),
        })
    }

    /// Nothing here is a symlink.
    pub fn readlink(&mut self, path: &RemotePath) -> FsResult<Vec<u8>> {
        traced("readlink", path, || {
            self.attr(path)?;
            Err(FsError::NotASymlink(path.to_string()))
        })
    }

    pub fn mknod(&mut self, path: &RemotePath) -> FsResult<()> {
        traced("mknod", path, || Err(FsError::Unsupported))
    }

    pub fn mkdir(&mut self, path: &RemotePath) -> FsResult<Attr> {
        traced("mkdir", path, || Err(FsError::ReadOnly))
    }

    pub fn rmdir(&mut self, path: &RemotePath) -> FsResult<()> {
        traced("rmdir", path, || Err(FsError::ReadOnly))
    }

    pub fn unlink(&mut self, path: &RemotePath) -> FsResult<()> {
        traced("unlink", path, || Err(FsError::ReadOnly))
    }

    pub fn symlink(&mut self, path: &RemotePath, _target: &str) -> FsResult<Attr> {
        traced("symlink", path, || Err(FsError::ReadOnly))
    }

    pub fn rename(&mut self, path: &RemotePath, _to: &RemotePath) -> FsResult<()> {
        traced("rename", path, || Err(FsError::ReadOnly))
    }

    pub fn link(&mut self, path: &RemotePath, _to: &RemotePath) -> FsResult<Attr> {
        traced("link", path, || Err(FsError::ReadOnly))
    }

    pub fn chmod(&mut self, path: &RemotePath, _mode: u32) -> FsResult<()> {
        traced("chmod", path, || Err(FsError::ReadOnly))
    }

    pub fn chown(&mut self, path: &RemotePath, _uid: Option<u32>, _gid: Option<u32>) -> FsResult<()> {
        traced("chown", path, || Err(FsError::ReadOnly))
    }

    pub fn create(&mut self, path: &RemotePath, _mode: u32) -> FsResult<u64> {
        traced("create", path, || Err(FsError::ReadOnly))
    }

    pub fn write(&mut self, path: &RemotePath, _data: &[u8], _offset: u64) -> FsResult<u32> {
        traced("write", path, || Err(FsError::ReadOnly))
    }

    pub fn truncate(&mut self, path: &RemotePath, _size: u64) -> FsResult<()> {
        traced("truncate", path, || Err(FsError::ReadOnly))
    }

    pub fn utimens(&mut self, path: &RemotePath) -> FsResult<()> {
        traced("utimens", path, || Err(FsError::ReadOnly))
    }

    /// Fixed capacity figures.
    pub fn statfs(&mut self, path: &RemotePath) -> FsResult<StatFs> {
        traced("statfs", path, || Ok(StatFs::FIXED))
    }

    pub fn flush(&mut self, path: &RemotePath, _fh: u64) -> FsResult<()> {
        traced("flush", path, || Ok(()))
    }

    pub fn fsync(&mut self, path: &RemotePath, _fh: u64) -> FsResult<()> {
        traced("fsync", path, || Ok(()))
    }

    /// Drops the handle. Always succeeds, even for an unknown handle.
    pub fn release(&mut self, path: &RemotePath, fh: u64) -> FsResult<()> {
        traced("release", path, || {
            self.handles.remove(fh);
            Ok(())
        })
    }
}
