//! Virtual paths inside a mounted HTTP tree.
//!
//! A [`RemotePath`] is the user-facing path the kernel hands us (e.g.
//! `/pub/linux/README`), stored root-relative. It is also the key of the
//! [`PathCache`](crate::cache::PathCache) and the suffix appended to the
//! mount's root URL when fetching.

use relative_path::{Component, RelativePath, RelativePathBuf};
use std::fmt;

/// Root-relative path within a mounted HTTP tree.
///
/// Paths use `/` as the separator regardless of the host OS. Leading
/// slashes are stripped, so `/a/b` and `a/b` are the same path.
///
/// # Examples
///
/// ```
/// use httpmount_core::RemotePath;
///
/// let path = RemotePath::new("/pub/README");
/// assert_eq!(path.file_name(), Some("README"));
/// assert_eq!(path.parent().unwrap().as_str(), "pub");
/// assert_eq!(path, RemotePath::new("pub/README"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath(RelativePathBuf);

impl RemotePath {
    /// The root path (empty).
    #[inline]
    pub fn root() -> Self {
        RemotePath(RelativePathBuf::new())
    }

    /// Create a new path from a string, stripping leading slashes.
    pub fn new(path: impl AsRef<str>) -> Self {
        let s = path.as_ref().trim_start_matches('/');
        RemotePath(RelativePathBuf::from(s))
    }

    /// Check if this is the root path.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.as_str().is_empty()
    }

    /// Get the string representation of this path (no leading slash).
    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the underlying `RelativePath`.
    #[inline]
    pub fn as_relative_path(&self) -> &RelativePath {
        &self.0
    }

    /// Join this path with a single child name.
    ///
    /// ```
    /// use httpmount_core::RemotePath;
    ///
    /// let file = RemotePath::root().join("pub").join("README");
    /// assert_eq!(file.as_str(), "pub/README");
    /// ```
    pub fn join(&self, component: impl AsRef<str>) -> Self {
        RemotePath(self.0.join(component.as_ref()))
    }

    /// Get the parent path. Returns `None` for the root path.
    pub fn parent(&self) -> Option<RemotePath> {
        if self.is_root() {
            return None;
        }
        self.0.parent().map(|p| RemotePath(p.to_relative_path_buf()))
    }

    /// Get the final component of this path. Returns `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    /// Iterate over the components of this path.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.components().map(|c| c.as_str())
    }

    /// Number of components; the root has depth 0.
    pub fn depth(&self) -> usize {
        self.0.components().count()
    }

    /// True if any component is `.` or `..`.
    ///
    /// Such paths could step outside the configured root once appended to
    /// the root URL, so the cache refuses to resolve them.
    pub fn has_traversal(&self) -> bool {
        self.0
            .components()
            .any(|c| matches!(c, Component::CurDir | Component::ParentDir))
    }

    /// Split this path into parent path and final component.
    ///
    /// Returns `None` for the root path.
    pub fn split(&self) -> Option<(RemotePath, &str)> {
        let parent = self.parent()?;
        let name = self.file_name()?;
        Some((parent, name))
    }
}

impl AsRef<str> for RemotePath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "/{}", self.0)
        }
    }
}

impl From<&str> for RemotePath {
    fn from(s: &str) -> Self {
        RemotePath::new(s)
    }
}

impl From<String> for RemotePath {
    fn from(s: String) -> Self {
        RemotePath::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root() {
        let root = RemotePath::root();
        assert!(root.is_root());
        assert_eq!(root.as_str(), "");
        assert_eq!(root.to_string(), "/");
        assert_eq!(root.depth(), 0);
        assert!(root.parent().is_none());
        assert!(root.file_name().is_none());
    }

    #[test]
    fn test_slash_is_root() {
        assert!(RemotePath::new("/").is_root());
        assert_eq!(RemotePath::new("/"), RemotePath::root());
    }

    #[test]
    fn test_normalization() {
        let p1 = RemotePath::new("/pub/file.txt");
        let p2 = RemotePath::new("pub/file.txt");
        assert_eq!(p1, p2);
        assert_eq!(p1.as_str(), "pub/file.txt");
        assert_eq!(p1.to_string(), "/pub/file.txt");
    }

    #[test]
    fn test_parent_chain() {
        let path = RemotePath::new("a/b/c.txt");
        assert_eq!(path.depth(), 3);

        let parent1 = path.parent().unwrap();
        assert_eq!(parent1.as_str(), "a/b");

        let parent2 = parent1.parent().unwrap();
        assert_eq!(parent2.as_str(), "a");

        let parent3 = parent2.parent().unwrap();
        assert!(parent3.is_root());
        assert!(parent3.parent().is_none());
    }

    #[test]
    fn test_join_and_split() {
        let file = RemotePath::root().join("docs").join("a.txt");
        assert_eq!(file.as_str(), "docs/a.txt");

        let (parent, name) = file.split().unwrap();
        assert_eq!(parent.as_str(), "docs");
        assert_eq!(name, "a.txt");

        assert!(RemotePath::root().split().is_none());
    }

    #[test]
    fn test_components() {
        let path = RemotePath::new("a/b/c");
        let components: Vec<_> = path.components().collect();
        assert_eq!(components, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_traversal_detection() {
        assert!(RemotePath::new("../etc/passwd").has_traversal());
        assert!(RemotePath::new("a/../../b").has_traversal());
        assert!(RemotePath::new("a/./b").has_traversal());
        assert!(!RemotePath::new("a/..b/c").has_traversal());
        assert!(!RemotePath::root().has_traversal());
    }
}
