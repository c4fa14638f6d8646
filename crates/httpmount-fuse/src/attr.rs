//! File attributes and filesystem statistics.
//!
//! Attributes are derived from the listing entry of each path, so they are
//! only as accurate as the listing. A file's size becomes exact once its
//! content has been fetched.

use fuser::{FileAttr, FileType};
use httpmount_core::{DirectoryEntry, EntryKind};
use std::time::SystemTime;

/// Block size for FUSE.
pub const BLOCK_SIZE: u32 = 4096;

/// Permission bits for directories (r-x for everyone).
pub const DIR_PERM: u16 = 0o555;

/// Permission bits for files (r-- for everyone).
pub const FILE_PERM: u16 = 0o444;

/// Attributes of one path, independent of its inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr {
    pub kind: EntryKind,
    pub perm: u16,
    pub size: u64,
    pub nlink: u32,
    pub mtime: SystemTime,
    pub uid: u32,
    pub gid: u32,
}

impl Attr {
    /// Builds attributes from a listing entry, owned by `uid:gid`.
    pub fn from_entry(entry: &DirectoryEntry, uid: u32, gid: u32) -> Self {
        let (perm, nlink) = match entry.kind {
            EntryKind::Directory => (DIR_PERM, 2),
            EntryKind::File => (FILE_PERM, 1),
        };
        Self {
            kind: entry.kind,
            perm,
            size: entry.size,
            nlink,
            mtime: entry.modified,
            uid,
            gid,
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Converts to the kernel's attribute record for inode `ino`.
    pub fn to_file_attr(&self, ino: u64) -> FileAttr {
        let kind = match self.kind {
            EntryKind::Directory => FileType::Directory,
            EntryKind::File => FileType::RegularFile,
        };
        FileAttr {
            ino,
            size: self.size,
            blocks: self.size.div_ceil(u64::from(BLOCK_SIZE)),
            atime: self.mtime,
            mtime: self.mtime,
            ctime: self.mtime,
            crtime: self.mtime,
            kind,
            perm: self.perm,
            nlink: self.nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }
}

/// Figures reported by `statfs`.
///
/// The remote side has no notion of capacity, so these are fixed values
/// that keep `df` and friends happy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFs {
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub bsize: u32,
    pub namelen: u32,
    pub frsize: u32,
}

impl StatFs {
    pub const FIXED: StatFs = StatFs {
        blocks: 4_114_392,
        bfree: 4_114_392,
        bavail: 4_114_392,
        files: 4_114_392,
        ffree: 4_113_860,
        bsize: BLOCK_SIZE,
        namelen: 255,
        frsize: BLOCK_SIZE,
    };
}
