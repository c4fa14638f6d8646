//! Inode management for the FUSE filesystem.
//!
//! The kernel addresses everything by inode number while the cache is keyed
//! by [`RemotePath`], so this table keeps the bidirectional mapping plus the
//! `nlookup` count that decides when the kernel has let go of an inode.

use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use httpmount_core::RemotePath;
use std::sync::atomic::{AtomicU64, Ordering};

/// The root inode number (FUSE convention).
pub const ROOT_INODE: u64 = 1;

/// An entry in the inode table.
#[derive(Debug)]
pub struct InodeEntry {
    /// The path within the mounted tree.
    pub path: RemotePath,
    /// Lookup count for proper `forget()` handling.
    nlookup: AtomicU64,
}

impl InodeEntry {
    fn new(path: RemotePath, nlookup: u64) -> Self {
        Self {
            path,
            nlookup: AtomicU64::new(nlookup),
        }
    }

    /// Increments the lookup count and returns the new value.
    pub fn inc_nlookup(&self) -> u64 {
        self.nlookup.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrements the lookup count by the given amount and returns the new value.
    /// Returns `None` if the count would go negative.
    pub fn dec_nlookup(&self, count: u64) -> Option<u64> {
        let old = self.nlookup.fetch_sub(count, Ordering::AcqRel);
        if old < count {
            self.nlookup.fetch_add(count, Ordering::Relaxed);
            None
        } else {
            Some(old - count)
        }
    }

    /// Returns the current lookup count.
    pub fn nlookup(&self) -> u64 {
        self.nlookup.load(Ordering::Relaxed)
    }
}

/// Table mapping between inodes and remote paths.
///
/// Inode numbers are never reused within a mount.
pub struct InodeTable {
    path_to_inode: DashMap<RemotePath, u64>,
    inodes: DashMap<u64, InodeEntry>,
    next_inode: AtomicU64,
}

impl InodeTable {
    /// Creates a new inode table with the root directory pre-allocated.
    pub fn new() -> Self {
        let table = Self {
            path_to_inode: DashMap::new(),
            inodes: DashMap::new(),
            next_inode: AtomicU64::new(ROOT_INODE + 1),
        };
        table.path_to_inode.insert(RemotePath::root(), ROOT_INODE);
        table
            .inodes
            .insert(ROOT_INODE, InodeEntry::new(RemotePath::root(), 1));
        table
    }

    /// Returns the inode for `path`, allocating one if needed, and counts a
    /// kernel lookup against it.
    pub fn get_or_insert(&self, path: &RemotePath) -> u64 {
        if let Some(inode) = self.get_inode(path) {
            if let Some(entry) = self.inodes.get(&inode) {
                entry.inc_nlookup();
            }
            return inode;
        }
        self.allocate(path, 1)
    }

    /// Returns the inode for `path` without touching the lookup count.
    ///
    /// `readdir()` hands out inode numbers but must not change nlookup; only
    /// `lookup()` does.
    pub fn get_or_insert_no_lookup_inc(&self, path: &RemotePath) -> u64 {
        self.get_inode(path)
            .unwrap_or_else(|| self.allocate(path, 0))
    }

    fn allocate(&self, path: &RemotePath, nlookup: u64) -> u64 {
        *self
            .path_to_inode
            .entry(path.clone())
            .or_insert_with(|| {
                let inode = self.next_inode.fetch_add(1, Ordering::Relaxed);
                self.inodes
                    .insert(inode, InodeEntry::new(path.clone(), nlookup));
                inode
            })
    }

    /// Looks up an entry by inode number.
    pub fn get(&self, inode: u64) -> Option<Ref<'_, u64, InodeEntry>> {
        self.inodes.get(&inode)
    }

    /// Returns the path of an inode.
    pub fn path(&self, inode: u64) -> Option<RemotePath> {
        self.inodes.get(&inode).map(|entry| entry.path.clone())
    }

    /// Looks up an inode by path.
    pub fn get_inode(&self, path: &RemotePath) -> Option<u64> {
        self.path_to_inode.get(path).map(|r| *r)
    }

    /// Decrements the lookup count for an inode.
    /// Returns `true` if the count reached zero and the inode was evicted.
    pub fn forget(&self, inode: u64, nlookup: u64) -> bool {
        if inode == ROOT_INODE {
            return false;
        }

        let evict = self
            .inodes
            .get(&inode)
            .and_then(|entry| entry.dec_nlookup(nlookup))
            == Some(0);
        evict && self.evict(inode)
    }

    fn evict(&self, inode: u64) -> bool {
        match self.inodes.remove(&inode) {
            Some((_, entry)) => {
                self.path_to_inode.remove_if(&entry.path, |_, v| *v == inode);
                true
            }
            None => false,
        }
    }

    /// Returns the number of inodes currently in the table.
    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    /// Returns true if the table only contains the root inode.
    pub fn is_empty(&self) -> bool {
        self.inodes.len() <= 1
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_inode_exists() {
        let table = InodeTable::new();
        assert!(table.path(ROOT_INODE).unwrap().is_root());
        assert_eq!(table.get_inode(&RemotePath::root()), Some(ROOT_INODE));
        assert!(table.is_empty());
    }

    #[test]
    fn test_allocate_inode() {
        let table = InodeTable::new();
        let path = RemotePath::new("docs");

        let inode = table.get_or_insert(&path);
        assert!(inode > ROOT_INODE);
        assert_eq!(table.get_or_insert(&path), inode);
        assert_eq!(table.get(inode).unwrap().nlookup(), 2);
        assert_eq!(table.path(inode), Some(path));
    }

    #[test]
    fn test_inodes_are_distinct() {
        let table = InodeTable::new();
        let a = table.get_or_insert(&RemotePath::new("a"));
        let b = table.get_or_insert(&RemotePath::new("a/b"));
        assert_ne!(a, b);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_readdir_allocation_does_not_count() {
        let table = InodeTable::new();
        let path = RemotePath::new("listed");

        let inode = table.get_or_insert_no_lookup_inc(&path);
        assert_eq!(table.get(inode).unwrap().nlookup(), 0);

        assert_eq!(table.get_or_insert(&path), inode);
        assert_eq!(table.get(inode).unwrap().nlookup(), 1);
    }

    #[test]
    fn test_forget_evicts() {
        let table = InodeTable::new();
        let path = RemotePath::new("temp");
        let inode = table.get_or_insert(&path);
        table.get_or_insert(&path);

        assert!(!table.forget(inode, 1));
        assert!(table.get(inode).is_some());

        assert!(table.forget(inode, 1));
        assert!(table.get(inode).is_none());
        assert!(table.get_inode(&path).is_none());
    }

    #[test]
    fn test_forget_more_than_counted_is_ignored() {
        let table = InodeTable::new();
        let inode = table.get_or_insert(&RemotePath::new("x"));
        assert!(!table.forget(inode, 5));
        assert_eq!(table.get(inode).unwrap().nlookup(), 1);
    }

    #[test]
    fn test_forget_root_never_evicts() {
        let table = InodeTable::new();
        assert!(!table.forget(ROOT_INODE, 1));
        assert!(table.get(ROOT_INODE).is_some());
    }

    #[test]
    fn test_evicted_path_gets_fresh_inode() {
        let table = InodeTable::new();
        let path = RemotePath::new("again");
        let first = table.get_or_insert(&path);
        assert!(table.forget(first, 1));

        let second = table.get_or_insert(&path);
        assert_ne!(first, second);
    }
}
