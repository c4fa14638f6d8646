//! FUSE filesystem implementation for HTTP directory trees.
//!
//! [`HttpMountFS`] implements the fuser `Filesystem` trait by translating
//! inode numbers to [`RemotePath`]s and delegating to [`HttpFs`].
//!
//! | Operation | Behavior |
//! |-----------|----------|
//! | lookup/forget/batch_forget | nlookup tracked in [`InodeTable`] |
//! | getattr/access/readlink | derived from parent listings |
//! | opendir/readdir/releasedir | listing order, `.` and `..` first |
//! | open/read/release | `FOPEN_DIRECT_IO`, content served from memory |
//! | flush/fsync | no-ops |
//! | statfs | fixed figures |
//! | mknod | EPERM |
//! | everything that writes | EROFS |
//!
//! The session runs single-threaded: fuser calls back on one thread with
//! `&mut self`, so one request is handled at a time and the cache needs no
//! locking.

use crate::adapter::HttpFs;
use crate::config::MountConfig;
use crate::error::{FsError, FsResult};
use crate::inode::{InodeTable, ROOT_INODE};
use fuser::{
    FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use httpmount_core::{EntryKind, Fetcher, RemotePath};
use libc::c_int;
use std::ffi::OsStr;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{info, trace};
use url::Url;

/// FUSE front end for one mounted HTTP tree.
pub struct HttpMountFS<F> {
    fs: HttpFs<F>,
    inodes: InodeTable,
    ttl: Duration,
}

impl<F: Fetcher> HttpMountFS<F> {
    /// Creates a filesystem for the tree at `root`.
    pub fn new(root: Url, fetcher: F, config: &MountConfig) -> Self {
        Self {
            fs: HttpFs::new(root, fetcher, config.uid, config.gid),
            inodes: InodeTable::new(),
            ttl: config.attr_ttl,
        }
    }

    /// The path-level filesystem behind this front end.
    pub fn inner(&self) -> &HttpFs<F> {
        &self.fs
    }

    /// The inode table.
    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    fn path(&self, ino: u64) -> FsResult<RemotePath> {
        self.inodes.path(ino).ok_or(FsError::InvalidInode(ino))
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> FsResult<RemotePath> {
        let parent_path = self.path(parent)?;
        // Listing names are always valid UTF-8, so anything else cannot exist.
        let name = name
            .to_str()
            .ok_or_else(|| FsError::NotFound(name.to_string_lossy().into_owned()))?;
        Ok(parent_path.join(name))
    }

    /// Path for an operation that fails regardless of whether the path exists.
    fn mutation_path(&self, parent: u64, name: &OsStr) -> RemotePath {
        self.path(parent)
            .unwrap_or_else(|_| RemotePath::root())
            .join(name.to_string_lossy().as_ref())
    }

    /// Path for a handle-based call, falling back to the inode's path.
    fn handle_path(&self, ino: u64, fh: u64) -> FsResult<RemotePath> {
        self.fs.handle_path(fh).or_else(|_| self.path(ino))
    }

    fn do_lookup(&mut self, parent: u64, name: &OsStr) -> FsResult<fuser::FileAttr> {
        let path = self.child_path(parent, name)?;
        let attr = self.fs.getattr(&path)?;
        let ino = self.inodes.get_or_insert(&path);
        Ok(attr.to_file_attr(ino))
    }

    fn do_getattr(&mut self, ino: u64) -> FsResult<fuser::FileAttr> {
        let path = self.path(ino)?;
        Ok(self.fs.getattr(&path)?.to_file_attr(ino))
    }

    fn do_readdir(&mut self, ino: u64, offset: i64, reply: &mut ReplyDirectory) -> FsResult<()> {
        let path = self.path(ino)?;
        let items = self.fs.readdir(&path)?;
        let parent_ino = path
            .parent()
            .and_then(|parent| self.inodes.get_inode(&parent))
            .unwrap_or(ROOT_INODE);
        let skip = usize::try_from(offset).unwrap_or(0);

        for (index, item) in items.iter().enumerate().skip(skip) {
            let entry_ino = match item.name.as_str() {
                "." => ino,
                ".." => parent_ino,
                name => self.inodes.get_or_insert_no_lookup_inc(&path.join(name)),
            };
            let file_type = match item.kind {
                EntryKind::Directory => FileType::Directory,
                EntryKind::File => FileType::RegularFile,
            };
            let next_offset = i64::try_from(index + 1).unwrap_or(i64::MAX);
            if reply.add(entry_ino, next_offset, file_type, &item.name) {
                break;
            }
        }
        Ok(())
    }

    fn do_opendir(&mut self, ino: u64) -> FsResult<()> {
        let path = self.path(ino)?;
        if self.fs.getattr(&path)?.is_dir() {
            Ok(())
        } else {
            Err(FsError::NotADirectory(path.to_string()))
        }
    }
}

impl<F: Fetcher> Filesystem for HttpMountFS<F> {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!(root = %self.fs.cache().root(), "FUSE filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        info!(
            fetches = self.fs.cache().fetch_count(),
            cached_paths = self.fs.cache().len(),
            "FUSE filesystem destroyed"
        );
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!(parent, name = ?name, "lookup");
        match self.do_lookup(parent, name) {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        trace!(inode = ino, nlookup, "forget");
        self.inodes.forget(ino, nlookup);
    }

    fn batch_forget(&mut self, _req: &Request<'_>, nodes: &[fuser::fuse_forget_one]) {
        trace!(count = nodes.len(), "batch_forget");
        for node in nodes {
            self.inodes.forget(node.nodeid, node.nlookup);
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!(inode = ino, "getattr");
        match self.do_getattr(ino) {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        trace!(inode = ino, "setattr");
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(e) => return reply.error(e.to_errno()),
        };
        let result = if let Some(mode) = mode {
            self.fs.chmod(&path, mode)
        } else if uid.is_some() || gid.is_some() {
            self.fs.chown(&path, uid, gid)
        } else if let Some(size) = size {
            self.fs.truncate(&path, size)
        } else {
            self.fs.utimens(&path)
        };
        match result {
            Ok(()) => reply.error(libc::EROFS),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        trace!(inode = ino, "readlink");
        let result = self.path(ino).and_then(|path| self.fs.readlink(&path));
        match result {
            Ok(target) => reply.data(&target),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        trace!(parent, name = ?name, "mknod");
        let path = self.mutation_path(parent, name);
        match self.fs.mknod(&path) {
            Ok(()) => reply.error(libc::EPERM),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        trace!(parent, name = ?name, "mkdir");
        let path = self.mutation_path(parent, name);
        match self.fs.mkdir(&path) {
            Ok(_) => reply.error(libc::EROFS),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!(parent, name = ?name, "unlink");
        let path = self.mutation_path(parent, name);
        match self.fs.unlink(&path) {
            Ok(()) => reply.error(libc::EROFS),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!(parent, name = ?name, "rmdir");
        let path = self.mutation_path(parent, name);
        match self.fs.rmdir(&path) {
            Ok(()) => reply.error(libc::EROFS),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        trace!(parent, name = ?link_name, target = ?target, "symlink");
        let path = self.mutation_path(parent, link_name);
        match self.fs.symlink(&path, &target.to_string_lossy()) {
            Ok(_) => reply.error(libc::EROFS),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        trace!(parent, name = ?name, newparent, newname = ?newname, "rename");
        let from = self.mutation_path(parent, name);
        let to = self.mutation_path(newparent, newname);
        match self.fs.rename(&from, &to) {
            Ok(()) => reply.error(libc::EROFS),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        trace!(inode = ino, newparent, newname = ?newname, "link");
        let from = self.path(ino).unwrap_or_else(|_| RemotePath::root());
        let to = self.mutation_path(newparent, newname);
        match self.fs.link(&from, &to) {
            Ok(_) => reply.error(libc::EROFS),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, flags, "open");
        let result = self.path(ino).and_then(|path| self.fs.open(&path, flags));
        match result {
            // Direct I/O keeps the kernel from clipping reads to a size it
            // cached before the exact length was known.
            Ok(fh) => reply.opened(fh, fuser::consts::FOPEN_DIRECT_IO),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(inode = ino, fh, offset, size, "read");
        let Ok(offset) = u64::try_from(offset) else {
            return reply.error(libc::EINVAL);
        };
        let result = self
            .fs
            .handle_path(fh)
            .and_then(|path| self.fs.read(&path, size, offset));
        match result {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        trace!(inode = ino, fh, offset, len = data.len(), "write");
        let path = self.handle_path(ino, fh).unwrap_or_else(|_| RemotePath::root());
        match self.fs.write(&path, data, u64::try_from(offset).unwrap_or(0)) {
            Ok(_) => reply.error(libc::EROFS),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        trace!(inode = ino, fh, "flush");
        let result = self.handle_path(ino, fh).and_then(|path| self.fs.flush(&path, fh));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        trace!(inode = ino, fh, "release");
        let path = self.handle_path(ino, fh).unwrap_or_else(|_| RemotePath::root());
        match self.fs.release(&path, fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, ino: u64, fh: u64, _datasync: bool, reply: ReplyEmpty) {
        trace!(inode = ino, fh, "fsync");
        let result = self.handle_path(ino, fh).and_then(|path| self.fs.fsync(&path, fh));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, "opendir");
        match self.do_opendir(ino) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        trace!(inode = ino, offset, "readdir");
        match self.do_readdir(ino, offset, &mut reply) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn releasedir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        trace!(inode = ino, "releasedir");
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        trace!(inode = ino, "statfs");
        let path = self.path(ino).unwrap_or_else(|_| RemotePath::root());
        match self.fs.statfs(&path) {
            Ok(st) => reply.statfs(
                st.blocks, st.bfree, st.bavail, st.files, st.ffree, st.bsize, st.namelen,
                st.frsize,
            ),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        trace!(inode = ino, mask, "access");
        let result = self.path(ino).and_then(|path| self.fs.access(&path, mask));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        trace!(parent, name = ?name, "create");
        let path = self.mutation_path(parent, name);
        match self.fs.create(&path, mode) {
            Ok(_) => reply.error(libc::EROFS),
            Err(e) => reply.error(e.to_errno()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmount_core::testing::{ListingPage, StaticFetcher};

    fn mount() -> HttpMountFS<StaticFetcher> {
        let fetcher = StaticFetcher::new()
            .page(
                "/",
                &ListingPage::new("/")
                    .dir("sub", "01-Jan-2020 12:00")
                    .file("a.txt", "02-Jan-2020 13:30", "10K"),
            )
            .page("/sub", &ListingPage::new("/sub").file("b.txt", "02-Jan-2020 13:30", "1"))
            .file("/a.txt", "hello");
        let config = MountConfig::default().uid(1000).gid(1000);
        HttpMountFS::new(Url::parse("http://mirror.test/").unwrap(), fetcher, &config)
    }

    #[test]
    fn test_lookup_allocates_inodes() {
        let mut fs = mount();
        let attr = fs.do_lookup(ROOT_INODE, OsStr::new("sub")).unwrap();
        assert_eq!(attr.kind, FileType::Directory);
        assert_eq!(attr.uid, 1000);
        assert_eq!(fs.inodes().path(attr.ino), Some(RemotePath::new("sub")));

        let nested = fs.do_lookup(attr.ino, OsStr::new("b.txt")).unwrap();
        assert_eq!(nested.kind, FileType::RegularFile);
        assert_eq!(fs.inodes().path(nested.ino), Some(RemotePath::new("sub/b.txt")));
    }

    #[test]
    fn test_lookup_missing() {
        let mut fs = mount();
        let err = fs.do_lookup(ROOT_INODE, OsStr::new("nope")).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOENT);
        assert_eq!(fs.inodes().len(), 1);
    }

    #[test]
    fn test_getattr_unknown_inode() {
        let mut fs = mount();
        assert_eq!(fs.do_getattr(999).unwrap_err().to_errno(), libc::ENOENT);
    }

    #[test]
    fn test_getattr_root() {
        let mut fs = mount();
        let attr = fs.do_getattr(ROOT_INODE).unwrap();
        assert_eq!(attr.ino, ROOT_INODE);
        assert_eq!(attr.kind, FileType::Directory);
        assert_eq!(attr.size, 0);
    }

    #[test]
    fn test_opendir_on_file() {
        let mut fs = mount();
        let file = fs.do_lookup(ROOT_INODE, OsStr::new("a.txt")).unwrap();
        assert_eq!(fs.do_opendir(file.ino).unwrap_err().to_errno(), libc::ENOTDIR);
        assert!(fs.do_opendir(ROOT_INODE).is_ok());
    }

    #[test]
    fn test_handle_path_falls_back_to_inode() {
        let mut fs = mount();
        let file = fs.do_lookup(ROOT_INODE, OsStr::new("a.txt")).unwrap();
        assert_eq!(fs.handle_path(file.ino, 0).unwrap(), RemotePath::new("a.txt"));
    }
}
