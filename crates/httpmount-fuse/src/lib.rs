//! Read-only FUSE filesystem over an HTTP server's directory listings.
//!
//! Directories are the server's auto-generated "Index of" pages; files are
//! fetched whole on first access and served from memory afterwards. Nothing
//! is ever written back.
//!
//! # Usage
//!
//! ```ignore
//! use httpmount_core::HttpFetcher;
//! use httpmount_fuse::{HttpMountFS, MountConfig};
//!
//! let config = MountConfig::default();
//! let fetcher = HttpFetcher::new(config.io_timeout)?;
//! let fs = HttpMountFS::new(url, fetcher, &config);
//! fuser::mount2(fs, mountpoint, &[fuser::MountOption::RO])?;
//! ```

pub mod adapter;
pub mod attr;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod handles;
pub mod inode;

pub use adapter::{DirItem, HttpFs};
pub use attr::{Attr, StatFs};
pub use config::MountConfig;
pub use error::{FsError, FsResult, ToErrno};
pub use filesystem::HttpMountFS;
pub use handles::{HandleTable, OpenFile};
pub use inode::{InodeEntry, InodeTable, ROOT_INODE};
