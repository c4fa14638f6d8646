//! Error handling and mapping for the FUSE filesystem.
//!
//! Every adapter operation returns an [`FsError`]; the FUSE layer turns it
//! into the errno the kernel expects. Only cache integrity failures are
//! anomalies worth an `error!` log; everything else is an ordinary answer.

use httpmount_core::CacheError;
use thiserror::Error;

/// Errors produced by filesystem operations.
#[derive(Debug, Error)]
pub enum FsError {
    /// No such file or directory.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A directory operation hit a file.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// A file operation hit a directory.
    #[error("Is a directory: {0}")]
    IsADirectory(String),

    /// Any attempt to modify the tree or open it for writing.
    #[error("Read-only filesystem")]
    ReadOnly,

    /// Operations that are refused outright rather than for being writes.
    #[error("Operation not permitted")]
    Unsupported,

    /// Execute access on something that is not a directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// readlink on a path; no entry is ever a symlink.
    #[error("Not a symbolic link: {0}")]
    NotASymlink(String),

    /// Inode unknown to the inode table.
    #[error("Invalid inode: {0}")]
    InvalidInode(u64),

    /// File handle unknown to the handle table.
    #[error("Invalid file handle: {0}")]
    InvalidHandle(u64),

    /// Failure from the path cache.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl FsError {
    /// Converts this error to a libc error code for FUSE.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) | FsError::InvalidInode(_) => libc::ENOENT,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::IsADirectory(_) => libc::EISDIR,
            FsError::ReadOnly => libc::EROFS,
            FsError::Unsupported => libc::EPERM,
            FsError::PermissionDenied(_) => libc::EACCES,
            FsError::NotASymlink(_) => libc::EINVAL,
            FsError::InvalidHandle(_) => libc::EBADF,
            FsError::Cache(e) => e.to_errno(),
        }
    }

    /// True if this error means the remote tree is broken, as opposed to
    /// a normal negative answer or an unreachable server.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, FsError::Cache(e) if e.is_integrity_failure())
    }
}

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Extension trait to convert errors to errno.
pub trait ToErrno {
    /// Converts this error to a libc error code.
    fn to_errno(&self) -> i32;
}

impl ToErrno for CacheError {
    fn to_errno(&self) -> i32 {
        match self {
            // Traversal paths are treated as nonexistent.
            CacheError::NotFound { .. } | CacheError::InvalidPath { .. } => libc::ENOENT,
            CacheError::Status { .. }
            | CacheError::Transport(_)
            | CacheError::MalformedListing { .. }
            | CacheError::Inconsistency { .. }
            | CacheError::Url { .. } => libc::EIO,
        }
    }
}

impl ToErrno for FsError {
    fn to_errno(&self) -> i32 {
        FsError::to_errno(self)
    }
}
