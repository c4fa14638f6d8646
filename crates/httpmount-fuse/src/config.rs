//! Mount configuration for the FUSE filesystem.

use nix::unistd::User;
use std::time::Duration;
use tracing::warn;

/// Default timeout for a single GET request.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Default kernel cache lifetime for attributes and entries.
pub const DEFAULT_ATTR_TTL: Duration = Duration::from_secs(1);

/// Account that owns every file when `nobody` cannot be resolved.
pub const FALLBACK_ID: u32 = 65534;

/// Configuration options for the FUSE filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfig {
    /// Owner reported for every file and directory.
    pub uid: u32,

    /// Group reported for every file and directory.
    pub gid: u32,

    /// Timeout for each HTTP request. `None` lets a stalled server block
    /// the filesystem until it answers.
    ///
    /// Default: 30 seconds.
    pub io_timeout: Option<Duration>,

    /// How long the kernel may cache attributes and lookups.
    ///
    /// Default: 1 second.
    pub attr_ttl: Duration,
}

impl Default for MountConfig {
    /// Files owned by `nobody`, 30 second request timeout.
    fn default() -> Self {
        let (uid, gid) = nobody_ids();
        Self {
            uid,
            gid,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
            attr_ttl: DEFAULT_ATTR_TTL,
        }
    }
}

impl MountConfig {
    /// Sets the owner reported for every entry.
    #[must_use]
    pub fn uid(mut self, uid: u32) -> Self {
        self.uid = uid;
        self
    }

    /// Sets the group reported for every entry.
    #[must_use]
    pub fn gid(mut self, gid: u32) -> Self {
        self.gid = gid;
        self
    }

    /// Sets the per-request timeout; `None` disables it.
    #[must_use]
    pub fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the kernel attribute cache TTL.
    #[must_use]
    pub fn attr_ttl(mut self, ttl: Duration) -> Self {
        self.attr_ttl = ttl;
        self
    }
}

/// Resolves the uid and gid of the `nobody` account.
pub fn nobody_ids() -> (u32, u32) {
    match User::from_name("nobody") {
        Ok(Some(user)) => (user.uid.as_raw(), user.gid.as_raw()),
        Ok(None) => {
            warn!("no 'nobody' account, using {FALLBACK_ID}");
            (FALLBACK_ID, FALLBACK_ID)
        }
        Err(e) => {
            warn!(error = %e, "failed to look up 'nobody', using {FALLBACK_ID}");
            (FALLBACK_ID, FALLBACK_ID)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = MountConfig::default();
        assert_eq!(config.io_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.attr_ttl, Duration::from_secs(1));
        assert_eq!((config.uid, config.gid), nobody_ids());
    }

    #[test]
    fn test_builder_pattern() {
        let config = MountConfig::default()
            .uid(1000)
            .gid(100)
            .io_timeout(None)
            .attr_ttl(Duration::from_secs(60));
        assert_eq!(config.uid, 1000);
        assert_eq!(config.gid, 100);
        assert_eq!(config.io_timeout, None);
        assert_eq!(config.attr_ttl, Duration::from_secs(60));
    }
}
