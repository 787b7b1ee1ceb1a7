//! Library metadata model.
//!
//! Pure data: folders, files, and the two projections each produces for the
//! virtual filesystem (its virtual name and its attribute record). Nothing in
//! here touches the disk.

use std::collections::BTreeSet;
use std::time::{Duration, SystemTime};

use crate::ids::{FileId, FolderId};
use crate::vfs::FileAttr;

/// Permission bits of the virtual root directory.
pub const ROOT_DIR_PERM: u32 = 0o775;

/// Permission bits of every folder below the root.
pub const FOLDER_PERM: u32 = 0o755;

/// Permission bits of every file.
pub const FILE_PERM: u32 = 0o444;

/// Replace path separators so a name can be a single path segment.
pub fn sanitize(name: &str) -> String {
    name.replace('/', "_")
}

/// Convert epoch milliseconds to a `SystemTime`, clamping negatives to the
/// epoch.
pub fn from_epoch_millis(millis: f64) -> SystemTime {
    if !millis.is_finite() || millis <= 0.0 {
        return SystemTime::UNIX_EPOCH;
    }
    SystemTime::UNIX_EPOCH + Duration::from_millis(millis as u64)
}

/// A folder in the library's folder tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    /// Child folders in declared order.
    pub children: Vec<Folder>,
    pub modification_time: SystemTime,
}

impl Folder {
    /// `sanitize(name) + "_" + id`.
    pub fn virtual_name(&self) -> String {
        format!("{}_{}", sanitize(&self.name), self.id)
    }

    pub fn attr(&self) -> FileAttr {
        FileAttr::directory(FOLDER_PERM)
            .with_mtime(self.modification_time)
            .with_atime(self.modification_time)
            .owned_by_process()
    }
}

/// A library item.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub id: FileId,
    /// Stored name, without extension.
    pub name: String,
    /// Extension without the dot. Never `Some("")`.
    pub ext: Option<String>,
    /// Declared folder memberships. Empty means "directly under the root".
    pub folders: BTreeSet<FolderId>,
    pub is_deleted: bool,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub modification_time: SystemTime,
    pub last_modified: SystemTime,
}

impl File {
    /// `sanitize(name) + "_" + id [+ "." + ext]`.
    pub fn virtual_name(&self) -> String {
        match &self.ext {
            Some(ext) => format!("{}_{}.{}", sanitize(&self.name), self.id, sanitize(ext)),
            None => format!("{}_{}", sanitize(&self.name), self.id),
        }
    }

    /// File name of the binary payload inside the item directory.
    ///
    /// Uses the stored name, not the virtual name.
    pub fn payload_name(&self) -> String {
        match &self.ext {
            Some(ext) => format!("{}.{}", self.name, ext),
            None => self.name.clone(),
        }
    }

    /// Folders this file is listed under: its declared folders, or the root
    /// when it declares none.
    pub fn effective_folders(&self) -> Vec<FolderId> {
        if self.folders.is_empty() {
            vec![FolderId::root()]
        } else {
            self.folders.iter().cloned().collect()
        }
    }

    /// Whether `folder` is one of this file's effective folders.
    pub fn belongs_to(&self, folder: &FolderId) -> bool {
        if folder.is_root() {
            self.folders.is_empty()
        } else {
            self.folders.contains(folder)
        }
    }

    /// Whether this file should appear when listing `folder`.
    pub fn is_visible_in(&self, folder: &FolderId) -> bool {
        !self.is_deleted && self.belongs_to(folder)
    }

    pub fn attr(&self) -> FileAttr {
        FileAttr::file(self.size, FILE_PERM)
            .with_mtime(self.modification_time)
            .with_atime(self.last_modified)
            .with_ctime(self.last_modified)
            .owned_by_process()
    }
}

/// Result of resolving a virtual path to a library entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
    /// The virtual top-level directory.
    Root,
    Folder(Folder),
    File(File),
}

impl Metadata {
    /// Attribute record for the dispatch layer.
    pub fn attr(&self) -> FileAttr {
        match self {
            Metadata::Root => root_attr(),
            Metadata::Folder(folder) => folder.attr(),
            Metadata::File(file) => file.attr(),
        }
    }

    pub fn is_dir(&self) -> bool {
        !matches!(self, Metadata::File(_))
    }
}

/// Fixed attributes of the virtual root, independent of index state.
pub fn root_attr() -> FileAttr {
    FileAttr::directory(ROOT_DIR_PERM).owned_by_process()
}
