//! Filesystem-level behavior of a mounted tree, driven through the path API.

mod common;

use common::{mirror, mount, p, read_all, GID, UID};
use httpmount_core::testing::ListingPage;
use httpmount_core::{EntryKind, RemotePath};
use httpmount_fuse::StatFs;
use std::time::{Duration, UNIX_EPOCH};

#[test]
fn test_root_attributes_need_no_request() {
    let (mut fs, fetcher) = mount(mirror());
    let attr = fs.getattr(&RemotePath::root()).unwrap();
    assert!(attr.is_dir());
    assert_eq!(attr.perm, 0o555);
    assert_eq!(attr.size, 0);
    assert_eq!(attr.mtime, UNIX_EPOCH);
    assert_eq!((attr.uid, attr.gid), (UID, GID));
    assert_eq!(fetcher.total_requests(), 0);
}

#[test]
fn test_walk_tree() {
    let (mut fs, _) = mount(mirror());

    let root: Vec<_> = fs.readdir(&RemotePath::root()).unwrap();
    let names: Vec<_> = root.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, [".", "..", "sub", "a.txt"]);
    assert_eq!(root[2].kind, EntryKind::Directory);
    assert_eq!(root[3].kind, EntryKind::File);

    let sub: Vec<_> = fs
        .readdir(&p("sub"))
        .unwrap()
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert_eq!(sub, [".", "..", "deep.bin", "nested"]);

    let nested = fs.readdir(&p("sub/nested")).unwrap();
    assert_eq!(nested.len(), 2);
}

#[test]
fn test_listed_size_until_read_then_exact() {
    let (mut fs, _) = mount(mirror());

    let before = fs.getattr(&p("sub/deep.bin")).unwrap();
    assert_eq!(before.size, 1_572_864);
    assert_eq!(before.mtime, UNIX_EPOCH + Duration::from_secs(1_612_343_100));

    assert_eq!(read_all(&mut fs, "sub/deep.bin"), vec![7u8; 1000]);

    let after = fs.getattr(&p("sub/deep.bin")).unwrap();
    assert_eq!(after.size, 1000);
    assert_eq!(after.mtime, before.mtime);
}

#[test]
fn test_repeated_access_fetches_each_path_once() {
    let (mut fs, fetcher) = mount(mirror());

    for _ in 0..3 {
        fs.readdir(&RemotePath::root()).unwrap();
        fs.getattr(&p("a.txt")).unwrap();
        assert_eq!(read_all(&mut fs, "a.txt"), b"hello");
        assert!(fs.getattr(&p("missing")).is_err());
    }

    assert_eq!(fetcher.request_count("/"), 1);
    assert_eq!(fetcher.request_count("/a.txt"), 1);
    assert_eq!(fetcher.request_count("/missing"), 0);
    assert_eq!(fetcher.total_requests(), 2);
}

#[test]
fn test_errors_for_wrong_kind() {
    let (mut fs, _) = mount(mirror());

    assert_eq!(fs.readdir(&p("a.txt")).unwrap_err().to_errno(), libc::ENOTDIR);
    assert_eq!(fs.open(&p("sub"), libc::O_RDONLY).unwrap_err().to_errno(), libc::EISDIR);
    assert_eq!(fs.read(&p("sub"), 16, 0).unwrap_err().to_errno(), libc::EISDIR);
    assert_eq!(fs.readdir(&p("nope")).unwrap_err().to_errno(), libc::ENOENT);
    assert_eq!(fs.open(&p("sub/nope"), libc::O_RDONLY).unwrap_err().to_errno(), libc::ENOENT);
}

#[test]
fn test_write_access_is_refused_without_fetching() {
    let (mut fs, fetcher) = mount(mirror());
    let a = p("a.txt");

    for flags in [
        libc::O_WRONLY,
        libc::O_RDWR,
        libc::O_RDONLY | libc::O_APPEND,
        libc::O_RDONLY | libc::O_CREAT,
    ] {
        assert_eq!(fs.open(&a, flags).unwrap_err().to_errno(), libc::EROFS);
    }
    assert_eq!(fs.write(&a, b"data", 0).unwrap_err().to_errno(), libc::EROFS);
    assert_eq!(fs.unlink(&a).unwrap_err().to_errno(), libc::EROFS);
    assert_eq!(fs.mkdir(&p("new")).unwrap_err().to_errno(), libc::EROFS);
    assert_eq!(fetcher.total_requests(), 0);
}

#[test]
fn test_malformed_listing_fails_only_that_directory() {
    let broken = ListingPage::new("/sub/nested")
        .render()
        .replace("Last modified", "Date");
    let (mut fs, _) = mount(mirror().file("/sub/nested", broken));

    let err = fs.readdir(&p("sub/nested")).unwrap_err();
    assert_eq!(err.to_errno(), libc::EIO);
    assert!(err.is_integrity_failure());

    // The parent listing still describes the directory, and siblings work.
    assert!(fs.getattr(&p("sub/nested")).unwrap().is_dir());
    assert_eq!(fs.readdir(&p("sub")).unwrap().len(), 4);
    assert_eq!(read_all(&mut fs, "a.txt"), b"hello");
}

#[test]
fn test_file_missing_from_parent_listing_is_io_error() {
    // The server serves a file its parent listing does not mention.
    let (mut fs, fetcher) = mount(mirror().file("/ghost.txt", "boo"));

    let err = fs.open(&p("ghost.txt"), libc::O_RDONLY).unwrap_err();
    assert_eq!(err.to_errno(), libc::EIO);
    assert!(err.is_integrity_failure());
    assert_eq!(fs.open_handles(), 0);

    // The outcome is remembered: no further requests, and the file stays
    // out of the tree.
    for _ in 0..3 {
        let err = fs.open(&p("ghost.txt"), libc::O_RDONLY).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOENT);
    }
    assert_eq!(fs.getattr(&p("ghost.txt")).unwrap_err().to_errno(), libc::ENOENT);
    assert_eq!(fetcher.request_count("/ghost.txt"), 1);
}

#[test]
fn test_server_error_is_retried_on_next_access() {
    let (mut fs, fetcher) = mount(mirror().status("/a.txt", 503, "busy"));

    for _ in 0..2 {
        let err = fs.open(&p("a.txt"), libc::O_RDONLY).unwrap_err();
        assert_eq!(err.to_errno(), libc::EIO);
    }
    assert_eq!(fetcher.request_count("/a.txt"), 2);
}

#[test]
fn test_traversal_names_do_not_escape_root() {
    let (mut fs, fetcher) = mount(mirror());
    assert_eq!(fs.getattr(&p("sub/../a.txt")).unwrap_err().to_errno(), libc::ENOENT);
    assert_eq!(fs.getattr(&p("sub/..")).unwrap_err().to_errno(), libc::ENOENT);
    assert_eq!(fs.getattr(&p("..")).unwrap_err().to_errno(), libc::ENOENT);
    assert_eq!(fs.access(&p("sub/.."), libc::R_OK).unwrap_err().to_errno(), libc::ENOENT);
    assert_eq!(fs.readdir(&p("..")).unwrap_err().to_errno(), libc::ENOENT);
    assert!(fetcher.requests().iter().all(|path| !path.contains("..")));
}

#[test]
fn test_statfs_is_fixed() {
    let (mut fs, fetcher) = mount(mirror());
    assert_eq!(fs.statfs(&RemotePath::root()).unwrap(), StatFs::FIXED);
    assert_eq!(fetcher.total_requests(), 0);
}

#[test]
fn test_handles_outlive_nothing_after_release() {
    let (mut fs, _) = mount(mirror());
    let a = fs.open(&p("a.txt"), libc::O_RDONLY).unwrap();
    let b = fs.open(&p("sub/deep.bin"), libc::O_RDONLY).unwrap();
    assert_ne!(a, b);
    assert_eq!(fs.open_handles(), 2);
    assert_eq!(fs.handle_path(b).unwrap(), p("sub/deep.bin"));

    fs.release(&p("a.txt"), a).unwrap();
    fs.release(&p("sub/deep.bin"), b).unwrap();
    assert_eq!(fs.open_handles(), 0);
}
