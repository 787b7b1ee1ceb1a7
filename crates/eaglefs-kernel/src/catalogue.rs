//! Catalogue loading: folder-tree document and per-item sidecars.
//!
//! Both documents are deserialized into fixed-schema records with explicit
//! defaults and then converted into the model. Unknown fields are ignored;
//! the library application stores plenty we don't need (tags, palettes,
//! annotations).
//!
//! Failure policy differs by document: the folder tree is all-or-nothing,
//! while a broken sidecar only costs that one item.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::ids::{FileId, FolderId};
use crate::layout::{ITEM_DIR_SUFFIX, LibraryLayout, METADATA_FILE};
use crate::model::{File, Folder, from_epoch_millis};
use crate::vfs::{VfsError, VfsResult};

// ============================================================================
// Document schemas
// ============================================================================

#[derive(Debug, Deserialize)]
struct FolderTreeDocument {
    folders: Vec<FolderRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderRecord {
    id: String,
    name: String,
    #[serde(default)]
    children: Vec<FolderRecord>,
    #[serde(default)]
    modification_time: Option<f64>,
}

impl From<FolderRecord> for Folder {
    fn from(record: FolderRecord) -> Self {
        // Children are built before the parent takes ownership of them.
        let children = record.children.into_iter().map(Folder::from).collect();
        Folder {
            id: FolderId::new(record.id),
            name: record.name,
            children,
            modification_time: from_epoch_millis(record.modification_time.unwrap_or(0.0)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SidecarRecord {
    id: String,
    name: String,
    #[serde(default)]
    folders: Option<Vec<Option<String>>>,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    is_deleted: Option<bool>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    modification_time: Option<f64>,
    #[serde(default)]
    last_modified: Option<f64>,
}

impl From<SidecarRecord> for File {
    fn from(record: SidecarRecord) -> Self {
        let folders: BTreeSet<FolderId> = record
            .folders
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .map(FolderId::new)
            .collect();

        File {
            id: FileId::new(record.id),
            name: record.name,
            ext: record.ext.filter(|ext| !ext.is_empty()),
            folders,
            is_deleted: record.is_deleted.unwrap_or(false),
            size: record.size.unwrap_or(0),
            width: record.width.unwrap_or(0),
            height: record.height.unwrap_or(0),
            modification_time: from_epoch_millis(record.modification_time.unwrap_or(0.0)),
            last_modified: from_epoch_millis(record.last_modified.unwrap_or(0.0)),
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a folder-tree document.
pub fn parse_folder_tree(path: &Path, bytes: &[u8]) -> VfsResult<Vec<Folder>> {
    let doc: FolderTreeDocument =
        serde_json::from_slice(bytes).map_err(|e| VfsError::corrupt(path, e))?;
    Ok(doc.folders.into_iter().map(Folder::from).collect())
}

/// Parse a sidecar document.
pub fn parse_sidecar(path: &Path, bytes: &[u8]) -> VfsResult<File> {
    let record: SidecarRecord =
        serde_json::from_slice(bytes).map_err(|e| VfsError::corrupt(path, e))?;
    Ok(File::from(record))
}

/// Read and parse the sidecar at `path`.
///
/// A missing file is `StorageUnavailable`, a malformed one `CorruptMetadata`.
pub fn read_sidecar(path: &Path) -> VfsResult<File> {
    let bytes = fs::read(path).map_err(|e| VfsError::unavailable(path, e))?;
    parse_sidecar(path, &bytes)
}

// ============================================================================
// Loading
// ============================================================================

/// Load the folder tree. Any failure is fatal for the caller.
pub fn load_folder_tree(layout: &LibraryLayout) -> VfsResult<Vec<Folder>> {
    let path = layout.folder_tree_path();
    let bytes = fs::read(&path).map_err(|e| VfsError::unavailable(&path, e))?;
    let folders = parse_folder_tree(&path, &bytes)?;
    tracing::debug!(path = %path.display(), top_level = folders.len(), "loaded folder tree");
    Ok(folders)
}

/// Load every item sidecar under the item-storage directory.
///
/// Units with a missing or malformed sidecar are skipped with a warning.
/// Items flagged deleted are dropped before they reach the index.
pub fn load_files(layout: &LibraryLayout) -> HashMap<FileId, File> {
    let dir = layout.item_storage_dir();
    let mut files = HashMap::new();

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "item storage unreadable, no files loaded");
            return files;
        }
    };

    let mut skipped = 0usize;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "failed to read item storage entry");
                skipped += 1;
                continue;
            }
        };

        let unit = entry.path();
        let is_unit = unit
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(ITEM_DIR_SUFFIX));
        if !is_unit {
            continue;
        }

        let sidecar = unit.join(METADATA_FILE);
        let file = match read_sidecar(&sidecar) {
            Ok(file) => file,
            Err(VfsError::StorageUnavailable { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                tracing::warn!(path = %unit.display(), "skipping item without sidecar");
                skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(path = %sidecar.display(), error = %e, "skipping broken sidecar");
                skipped += 1;
                continue;
            }
        };

        if file.is_deleted {
            tracing::trace!(id = %file.id, "skipping deleted item");
            continue;
        }

        files.insert(file.id.clone(), file);
    }

    tracing::debug!(
        path = %dir.display(),
        loaded = files.len(),
        skipped,
        "loaded item sidecars"
    );
    files
}
