//! httpmount - Mount a web server's directory listings as a read-only
//! FUSE filesystem.
//!
//! Usage: httpmount <mountpoint> <url>

// Use mimalloc for reduced allocation latency (enabled by default).
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use httpmount_core::HttpFetcher;
use httpmount_fuse::{HttpMountFS, MountConfig};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// How often to check whether the filesystem was unmounted externally.
const UNMOUNT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "httpmount")]
#[command(about = "Mount an HTTP directory listing as a read-only filesystem")]
#[command(version)]
struct Cli {
    /// Mountpoint for the filesystem
    mountpoint: PathBuf,

    /// Root URL of the remote tree (http or https)
    #[arg(value_parser = parse_root_url)]
    url: Url,

    /// Per-request timeout in seconds (0 disables the timeout)
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn parse_root_url(s: &str) -> Result<Url, String> {
    let url = Url::parse(s).map_err(|e| format!("invalid URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme '{other}', expected http or https")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    if !cli.mountpoint.is_dir() {
        anyhow::bail!("Mountpoint is not a directory: {}", cli.mountpoint.display());
    }

    let timeout = (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout));
    let config = MountConfig::default().io_timeout(timeout);
    let fetcher = HttpFetcher::new(config.io_timeout).context("Failed to create HTTP client")?;

    info!(url = %cli.url, mount = %cli.mountpoint.display(), ?timeout, "Mounting");
    let fs = HttpMountFS::new(cli.url.clone(), fetcher, &config);

    mount_and_wait(&cli, fs)
}

/// Mount the filesystem and wait for Ctrl+C or an external unmount.
fn mount_and_wait(cli: &Cli, fs: HttpMountFS<HttpFetcher>) -> Result<()> {
    let host = cli.url.host_str().unwrap_or("localhost");
    let options = [
        fuser::MountOption::FSName(format!("httpmount:{host}")),
        fuser::MountOption::Subtype("httpmount".to_string()),
        fuser::MountOption::RO,
        fuser::MountOption::AutoUnmount,
    ];

    let (tx, rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to set signal handler")?;

    // The session runs on a single thread, so requests are served one at a time.
    let session = fuser::spawn_mount2(fs, &cli.mountpoint, &options).map_err(|e| {
        error!(error = %e, "Mount failed");
        anyhow::anyhow!("Failed to mount filesystem: {e}")
    })?;

    info!(
        "Filesystem mounted at {} (press Ctrl+C to unmount)",
        cli.mountpoint.display()
    );

    loop {
        match rx.recv_timeout(UNMOUNT_POLL_INTERVAL) {
            Ok(()) => {
                info!("Received interrupt signal, unmounting...");
                break;
            }
            Err(RecvTimeoutError::Timeout) if session.guard.is_finished() => {
                info!("Filesystem was unmounted externally");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Signal channel closed unexpectedly");
                break;
            }
        }
    }

    drop(session);
    info!("Filesystem unmounted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root_url_accepts_http_family() {
        assert!(parse_root_url("http://mirror.example/pub/").is_ok());
        assert!(parse_root_url("https://mirror.example/").is_ok());
    }

    #[test]
    fn test_parse_root_url_rejects_other_schemes() {
        assert!(parse_root_url("ftp://mirror.example/").is_err());
        assert!(parse_root_url("file:///tmp").is_err());
        assert!(parse_root_url("not a url").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["httpmount", "/mnt/x", "http://h/"]).unwrap();
        assert_eq!(cli.timeout, 30);
        assert!(!cli.debug);
        assert_eq!(cli.url.as_str(), "http://h/");
    }

    #[test]
    fn test_cli_requires_both_positionals() {
        assert!(Cli::try_parse_from(["httpmount", "/mnt/x"]).is_err());
    }
}
