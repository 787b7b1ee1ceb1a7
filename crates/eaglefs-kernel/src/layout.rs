//! On-disk layout of a library.
//!
//! ```text
//! <root>/metadata.json                    folder tree
//! <root>/images/<id>.info/metadata.json   per-item sidecar
//! <root>/images/<id>.info/<name>.<ext>    payload
//! ```

use std::path::{Component, Path, PathBuf};

use crate::ids::FileId;
use crate::model::File;

/// Name of both the folder-tree document and each sidecar.
pub const METADATA_FILE: &str = "metadata.json";

/// Directory holding one storage unit per item.
pub const ITEM_STORAGE_DIR: &str = "images";

/// Suffix of each item storage unit.
pub const ITEM_DIR_SUFFIX: &str = ".info";

/// Path derivation for one library root.
#[derive(Debug, Clone)]
pub struct LibraryLayout {
    root: PathBuf,
}

impl LibraryLayout {
    /// Create a layout rooted at the given path.
    ///
    /// The root is canonicalized when possible so that watcher paths (which
    /// arrive absolute and symlink-resolved) strip cleanly.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn folder_tree_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn item_storage_dir(&self) -> PathBuf {
        self.root.join(ITEM_STORAGE_DIR)
    }

    pub fn item_dir(&self, id: &FileId) -> PathBuf {
        self.item_storage_dir()
            .join(format!("{}{}", id, ITEM_DIR_SUFFIX))
    }

    pub fn sidecar_path(&self, id: &FileId) -> PathBuf {
        self.item_dir(id).join(METADATA_FILE)
    }

    pub fn payload_path(&self, file: &File) -> PathBuf {
        self.item_dir(&file.id).join(file.payload_name())
    }

    /// Make an absolute path relative to the library root.
    ///
    /// Returns `None` for paths outside the root.
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }
}

/// Item id encoded in a library-relative path.
///
/// `images/<id>.info` and anything below it yield `<id>`; every other path
/// (including `images` itself and `images/<id>` without the suffix) yields
/// `None`.
pub fn extract_item_id(rel_path: &Path) -> Option<FileId> {
    // Any component that is not a plain UTF-8 name rejects the whole path.
    let parts = rel_path
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<&str>>>()?;

    let [storage, unit, ..] = parts.as_slice() else {
        return None;
    };
    if *storage != ITEM_STORAGE_DIR {
        return None;
    }
    let id = unit.strip_suffix(ITEM_DIR_SUFFIX)?;
    if id.is_empty() {
        return None;
    }
    Some(FileId::new(id))
}

/// Whether a library-relative path is the folder-tree document.
pub fn is_folder_tree_document(rel_path: &Path) -> bool {
    rel_path == Path::new(METADATA_FILE)
}
