//! The library facade: one opened library, its index, and the calls the
//! filesystem dispatch layer makes against it.

use std::path::Path;
use std::sync::Arc;

use crate::catalogue::{load_files, load_folder_tree};
use crate::config::LibraryConfig;
use crate::content;
use crate::ids::{FileId, FolderId};
use crate::index::{Index, SharedIndex};
use crate::layout::LibraryLayout;
use crate::model::Metadata;
use crate::reconciler::Reconciler;
use crate::vfs::{DirEntry, FileAttr, OpenFlags, StatFs, VfsError, VfsOps, VfsResult};
use crate::watcher::{WatcherHandle, start_watcher};

/// Counts over the current index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryStats {
    /// Folders in the folder tree.
    pub folders: usize,
    /// Visible files.
    pub files: usize,
    /// Visible files listed directly under the root.
    pub root_files: usize,
    /// Total size of visible files.
    pub bytes: u64,
}

/// An opened library.
pub struct Library {
    config: LibraryConfig,
    layout: LibraryLayout,
    index: SharedIndex,
}

impl Library {
    /// Load the catalogue and build the index.
    ///
    /// Fails if the folder-tree document is missing or malformed. Broken
    /// sidecars are skipped.
    pub fn open(config: LibraryConfig) -> VfsResult<Self> {
        let layout = LibraryLayout::new(&config.root);
        let folders = load_folder_tree(&layout)?;
        let files = load_files(&layout);
        let index = Arc::new(Index::new(folders, files));

        let library = Self {
            config,
            layout,
            index,
        };
        let stats = library.stats();
        tracing::info!(
            path = %library.layout.root().display(),
            folders = stats.folders,
            files = stats.files,
            "library loaded"
        );
        Ok(library)
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn layout(&self) -> &LibraryLayout {
        &self.layout
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    // ========================================================================
    // Dispatch operations
    // ========================================================================

    /// Stat-like record for a virtual path.
    pub fn attributes(&self, path: &str) -> VfsResult<FileAttr> {
        tracing::debug!(path, "attributes");
        Ok(self.index.get_metadata(path)?.attr())
    }

    /// Virtual names under a folder path.
    pub fn list(&self, path: &str) -> VfsResult<Vec<String>> {
        tracing::debug!(path, "list");
        self.index.list_names(path)
    }

    pub fn list_entries(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        tracing::debug!(path, "list entries");
        self.index.list_entries(path)
    }

    /// Whether `path` may be opened with `flags`.
    ///
    /// `NotFound` if the path does not resolve; `false` for any access mode
    /// other than read-only.
    pub fn can_open_read_only(&self, path: &str, flags: OpenFlags) -> VfsResult<bool> {
        tracing::debug!(path, ?flags, "open");
        self.index.get_metadata(path)?;
        Ok(flags.is_read_only())
    }

    /// Read up to `length` bytes at `offset` from a file's payload.
    pub fn read(&self, path: &str, offset: u64, length: u64) -> VfsResult<Vec<u8>> {
        tracing::debug!(path, offset, length, "read");
        content::read_bytes(&self.index, &self.layout, path, offset, length)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    pub fn get_metadata(&self, path: &str) -> VfsResult<Metadata> {
        self.index.get_metadata(path)
    }

    pub fn search_folder(&self, path: &str) -> Option<FolderId> {
        self.index.search_folder(path)
    }

    pub fn search_file(&self, path: &str) -> Option<FileId> {
        self.index.search_file(path)
    }

    pub fn stats(&self) -> LibraryStats {
        let folders = self.index.tree().len();
        self.index.with_files(|files, _| {
            let mut stats = LibraryStats {
                folders,
                ..LibraryStats::default()
            };
            for file in files.values().filter(|f| !f.is_deleted) {
                stats.files += 1;
                stats.bytes += file.size;
                if file.folders.is_empty() {
                    stats.root_files += 1;
                }
            }
            stats
        })
    }

    // ========================================================================
    // Live updates
    // ========================================================================

    /// A reconciler writing into this library's index.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.layout.clone(), Arc::clone(&self.index))
    }

    /// Start following changes with the configured watch settings.
    ///
    /// `None` when watching is disabled in the config. Must be called from
    /// within a tokio runtime.
    pub fn watch(&self) -> VfsResult<Option<WatcherHandle>> {
        if !self.config.watch.enabled {
            tracing::debug!(path = %self.layout.root().display(), "watching disabled");
            return Ok(None);
        }
        start_watcher(self.reconciler(), &self.config.watch).map(Some)
    }
}

fn virtual_path(path: &Path) -> VfsResult<&str> {
    path.to_str()
        .ok_or_else(|| VfsError::not_found(path.to_string_lossy()))
}

impl VfsOps for Library {
    fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        self.attributes(virtual_path(path)?)
    }

    fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        self.list_entries(virtual_path(path)?)
    }

    fn open(&self, path: &Path, flags: OpenFlags) -> VfsResult<()> {
        let vpath = virtual_path(path)?;
        if self.can_open_read_only(vpath, flags)? {
            Ok(())
        } else {
            Err(VfsError::access_denied(vpath))
        }
    }

    fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        Library::read(self, virtual_path(path)?, offset, u64::from(size))
    }

    fn statfs(&self) -> VfsResult<StatFs> {
        let stats = self.stats();
        Ok(StatFs::read_only(
            (stats.folders + stats.files) as u64,
            stats.bytes,
        ))
    }
}
