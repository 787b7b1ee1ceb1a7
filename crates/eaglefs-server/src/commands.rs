//! Subcommand implementations.
//!
//! Output goes to a caller-supplied writer so the commands can be tested
//! without a terminal.

use std::io::Write;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use clap::Args;
use eaglefs_kernel::{FileAttr, Library, LibraryConfig, WatchConfig};
use eaglefs_kernel::config::{DEFAULT_COALESCE_MS, DEFAULT_POLL_INTERVAL_MS};

use crate::constants::CAT_CHUNK_SIZE;

/// Where the library lives and how to follow it.
#[derive(Args, Debug, Clone)]
pub struct LibraryArgs {
    /// Library root (the directory holding metadata.json and images/)
    #[arg(env = "EAGLEFS_LIBRARY")]
    pub library: PathBuf,

    /// Window for coalescing change events, in milliseconds
    #[arg(long, env = "EAGLEFS_COALESCE_MS", default_value_t = DEFAULT_COALESCE_MS)]
    pub coalesce_ms: u64,

    /// Poll interval for polling notification backends, in milliseconds
    #[arg(long, env = "EAGLEFS_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Don't follow library changes after loading
    #[arg(long, env = "EAGLEFS_NO_WATCH")]
    pub no_watch: bool,
}

impl LibraryArgs {
    pub fn config(&self) -> LibraryConfig {
        let watch = if self.no_watch {
            WatchConfig::disabled()
        } else {
            WatchConfig::default()
        };
        LibraryConfig::new(&self.library).with_watch(
            watch
                .with_coalesce_ms(self.coalesce_ms)
                .with_poll_interval_ms(self.poll_interval_ms),
        )
    }

    pub fn open(&self) -> Result<Library> {
        Library::open(self.config())
            .with_context(|| format!("failed to open library {}", self.library.display()))
    }
}

/// Print the names under a virtual folder, one per line.
pub fn ls(library: &Library, path: &str, out: &mut impl Write) -> Result<()> {
    for name in library.list(path)? {
        writeln!(out, "{}", name)?;
    }
    Ok(())
}

/// Print the attribute record of a virtual path.
pub fn stat(library: &Library, path: &str, out: &mut impl Write) -> Result<()> {
    let attr = library.attributes(path)?;
    write_attr(path, &attr, out)
}

fn write_attr(path: &str, attr: &FileAttr, out: &mut impl Write) -> Result<()> {
    let kind = if attr.is_dir() { "directory" } else { "file" };
    let secs = |t: std::time::SystemTime| {
        t.duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    };
    writeln!(out, "path:  {}", path)?;
    writeln!(out, "kind:  {}", kind)?;
    writeln!(out, "size:  {}", attr.size)?;
    writeln!(out, "mode:  {:o}", attr.perm)?;
    writeln!(out, "links: {}", attr.nlink)?;
    if let (Some(uid), Some(gid)) = (attr.uid, attr.gid) {
        writeln!(out, "owner: {}:{}", uid, gid)?;
    }
    writeln!(out, "mtime: {}", secs(attr.mtime))?;
    if let Some(atime) = attr.atime {
        writeln!(out, "atime: {}", secs(atime))?;
    }
    if let Some(ctime) = attr.ctime {
        writeln!(out, "ctime: {}", secs(ctime))?;
    }
    Ok(())
}

/// Copy a file's bytes to `out`.
///
/// With no `length`, reads to end of file in chunks.
pub fn cat(
    library: &Library,
    path: &str,
    offset: u64,
    length: Option<u64>,
    out: &mut impl Write,
) -> Result<()> {
    if let Some(length) = length {
        out.write_all(&library.read(path, offset, length)?)?;
        return Ok(());
    }

    let mut offset = offset;
    loop {
        let chunk = library.read(path, offset, CAT_CHUNK_SIZE)?;
        if chunk.is_empty() {
            break;
        }
        out.write_all(&chunk)?;
        offset += chunk.len() as u64;
    }
    Ok(())
}

/// Follow the library and log every applied batch until Ctrl-C.
///
/// Fails straight away when watching is disabled.
pub async fn watch(library: &Library) -> Result<()> {
    let Some(handle) = library.watch()? else {
        anyhow::bail!("watching is disabled for {}", library.layout().root().display());
    };
    let mut outcomes = handle.subscribe();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                tracing::info!("interrupted, stopping watcher");
                break;
            }
            outcome = outcomes.recv() => match outcome {
                Ok(outcome) => {
                    let stats = library.stats();
                    tracing::info!(
                        updated = outcome.updated,
                        removed = outcome.removed,
                        skipped = outcome.skipped,
                        tree_reloaded = outcome.tree_reloaded,
                        folders = stats.folders,
                        files = stats.files,
                        "library changed"
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "fell behind on batch outcomes");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    handle.stop().await;
    Ok(())
}

/// Mount the library and serve it until Ctrl-C.
#[cfg(feature = "fuse")]
pub async fn mount(library: Library, mountpoint: &std::path::Path) -> Result<()> {
    use std::sync::Arc;

    let library = Arc::new(library);
    let watcher = library.watch()?;

    let session = crate::fuse::mount(Arc::clone(&library), mountpoint)?;
    tracing::info!(mountpoint = %mountpoint.display(), "mounted, ctrl-c to unmount");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!(mountpoint = %mountpoint.display(), "unmounting");
    drop(session);
    if let Some(watcher) = watcher {
        watcher.stop().await;
    }
    Ok(())
}
