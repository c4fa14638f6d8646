//! Open file handles.
//!
//! Content lives in the path cache, so a handle only remembers which path
//! it was opened for. Handle ids start at 1 (0 is reserved for the null
//! handle) and are never reused within a mount.

use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use httpmount_core::RemotePath;
use std::sync::atomic::{AtomicU64, Ordering};

/// State behind one FUSE file handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    pub path: RemotePath,
}

/// Table of open file handles with auto-incrementing ids.
#[derive(Debug)]
pub struct HandleTable {
    handles: DashMap<u64, OpenFile>,
    next_id: AtomicU64,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers an open file and returns its handle id.
    pub fn insert(&self, file: OpenFile) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handles.insert(id, file);
        id
    }

    pub fn get(&self, id: u64) -> Option<Ref<'_, u64, OpenFile>> {
        self.handles.get(&id)
    }

    /// Removes and returns a handle.
    pub fn remove(&self, id: u64) -> Option<OpenFile> {
        self.handles.remove(&id).map(|(_, file)| file)
    }

    /// Number of handles currently open.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
