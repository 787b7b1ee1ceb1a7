//! VFS operations trait.
//!
//! This trait defines the calls a filesystem dispatch layer needs, path-based
//! with explicit offset/size. Calls are synchronous: the dispatch layer is a
//! single foreground context and all backing I/O is blocking anyway.

use std::path::Path;

use super::types::{DirEntry, FileAttr, OpenFlags, StatFs};
use super::{VfsError, VfsResult};

/// Core VFS operations trait.
///
/// Paths are virtual paths (`/A_F1/photo_X1.png`). Mutating operations have
/// default implementations that reject with [`VfsError::ReadOnly`], so a
/// read-only backend only implements the reading half.
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get file attributes.
    fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Read directory entries (no pagination, no `.`/`..`).
    fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Check that `path` exists and may be opened with `flags`.
    fn open(&self, path: &Path, flags: OpenFlags) -> VfsResult<()>;

    /// Read file contents.
    ///
    /// Reads up to `size` bytes starting at `offset`.
    /// Returns fewer bytes if EOF is reached.
    fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write data to a file.
    fn write(&self, _path: &Path, _offset: u64, _data: &[u8]) -> VfsResult<u32> {
        Err(VfsError::ReadOnly)
    }

    /// Create a new file.
    fn create(&self, _path: &Path, _mode: u32) -> VfsResult<FileAttr> {
        Err(VfsError::ReadOnly)
    }

    /// Create a new directory.
    fn mkdir(&self, _path: &Path, _mode: u32) -> VfsResult<FileAttr> {
        Err(VfsError::ReadOnly)
    }

    /// Remove a file.
    fn unlink(&self, _path: &Path) -> VfsResult<()> {
        Err(VfsError::ReadOnly)
    }

    /// Remove an empty directory.
    fn rmdir(&self, _path: &Path) -> VfsResult<()> {
        Err(VfsError::ReadOnly)
    }

    /// Rename a file or directory.
    fn rename(&self, _from: &Path, _to: &Path) -> VfsResult<()> {
        Err(VfsError::ReadOnly)
    }

    /// Truncate a file to the specified size.
    fn truncate(&self, _path: &Path, _size: u64) -> VfsResult<()> {
        Err(VfsError::ReadOnly)
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Returns true if this filesystem is read-only.
    fn read_only(&self) -> bool {
        true
    }

    /// Get filesystem statistics.
    fn statfs(&self) -> VfsResult<StatFs>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Read entire file contents.
    fn read_all(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let attr = self.getattr(path)?;
        let size = u32::try_from(attr.size).unwrap_or(u32::MAX);
        self.read(path, 0, size)
    }
}
