//! Shared fixture: a small mirror served from memory.

#![allow(dead_code)]

use httpmount_core::testing::{ListingPage, StaticFetcher};
use httpmount_core::RemotePath;
use httpmount_fuse::HttpFs;
use std::sync::Arc;
use url::Url;

pub const UID: u32 = 65534;
pub const GID: u32 = 65534;

/// ```text
/// /
/// ├── sub/
/// │   ├── deep.bin   (listed 1.5M, actually 1000 bytes)
/// │   └── nested/
/// └── a.txt          (listed 10K, actually "hello")
/// ```
pub fn mirror() -> StaticFetcher {
    StaticFetcher::new()
        .page(
            "/",
            &ListingPage::new("/")
                .dir("sub", "01-Jan-2020 12:00")
                .file("a.txt", "02-Jan-2020 13:30", "10K"),
        )
        .page(
            "/sub",
            &ListingPage::new("/sub")
                .file("deep.bin", "03-Feb-2021 09:05", "1.5M")
                .dir("nested", "03-Feb-2021 09:06"),
        )
        .page("/sub/nested", &ListingPage::new("/sub/nested"))
        .file("/a.txt", "hello")
        .file("/sub/deep.bin", vec![7u8; 1000])
}

/// Mounts `fetcher` at the server root, keeping a handle to inspect requests.
pub fn mount(fetcher: StaticFetcher) -> (HttpFs<Arc<StaticFetcher>>, Arc<StaticFetcher>) {
    let fetcher = Arc::new(fetcher);
    let fs = HttpFs::new(
        Url::parse("http://mirror.test/").unwrap(),
        Arc::clone(&fetcher),
        UID,
        GID,
    );
    (fs, fetcher)
}

pub fn p(path: &str) -> RemotePath {
    RemotePath::new(path)
}

/// Opens, reads everything, releases.
pub fn read_all(fs: &mut HttpFs<Arc<StaticFetcher>>, path: &str) -> Vec<u8> {
    let path = p(path);
    let fh = fs.open(&path, libc::O_RDONLY).unwrap();
    let mut out = Vec::new();
    loop {
        let chunk = fs.read(&path, 64, out.len() as u64).unwrap();
        if chunk.is_empty() {
            break;
        }
        out.extend_from_slice(&chunk);
    }
    fs.release(&path, fh).unwrap();
    out
}
