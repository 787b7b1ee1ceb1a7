//! The in-memory index over a library.
//!
//! Four structures:
//!
//! - the folder tree (owned, declared order) and a folder-id lookup into it,
//!   bundled as one immutable [`FolderTree`] snapshot
//! - `files_by_id`, which owns every [`File`]
//! - `files_by_folder`, a reverse index of file ids per folder id
//!
//! The reverse index only ever grows from the writer's side. Entries go stale
//! when a file is tombstoned, deleted, or leaves a folder, and they are purged
//! lazily by directory listings (see `resolver`).
//!
//! # Locking
//!
//! The tree snapshot sits behind a `RwLock<Arc<_>>` and is swapped whole on
//! reload, so readers clone the `Arc` and drop the lock immediately. The two
//! file maps each have their own `RwLock`. Lock order is always
//! tree → `files_by_id` → `files_by_folder`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ids::{FileId, FolderId};
use crate::model::{File, Folder};

/// Immutable folder tree plus a non-owning id lookup into it.
///
/// The lookup maps each folder id to the child-index path from the top-level
/// sequence down to the folder, so nothing aliases the owned tree.
#[derive(Debug, Default)]
pub struct FolderTree {
    roots: Vec<Folder>,
    by_id: HashMap<FolderId, Vec<usize>>,
}

impl FolderTree {
    /// Build the lookup for a freshly loaded tree.
    ///
    /// A folder id seen twice keeps its first occurrence in depth-first
    /// declared order.
    pub fn new(roots: Vec<Folder>) -> Self {
        let mut by_id = HashMap::new();
        let mut trail = Vec::new();
        for (i, folder) in roots.iter().enumerate() {
            trail.push(i);
            index_folder(folder, &mut trail, &mut by_id);
            trail.pop();
        }
        Self { roots, by_id }
    }

    /// Top-level folders in declared order.
    pub fn roots(&self) -> &[Folder] {
        &self.roots
    }

    pub fn get(&self, id: &FolderId) -> Option<&Folder> {
        let trail = self.by_id.get(id)?;
        let (first, rest) = trail.split_first()?;
        let mut folder = self.roots.get(*first)?;
        for i in rest {
            folder = folder.children.get(*i)?;
        }
        Some(folder)
    }

    pub fn contains(&self, id: &FolderId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Number of distinct folders in the tree.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn index_folder(
    folder: &Folder,
    trail: &mut Vec<usize>,
    by_id: &mut HashMap<FolderId, Vec<usize>>,
) {
    if by_id.contains_key(&folder.id) {
        tracing::warn!(id = %folder.id, "duplicate folder id in folder tree, keeping first");
    } else {
        by_id.insert(folder.id.clone(), trail.clone());
    }
    for (i, child) in folder.children.iter().enumerate() {
        trail.push(i);
        index_folder(child, trail, by_id);
        trail.pop();
    }
}

/// Shared, synchronized index over one library.
#[derive(Debug, Default)]
pub struct Index {
    tree: RwLock<Arc<FolderTree>>,
    files_by_id: RwLock<HashMap<FileId, File>>,
    files_by_folder: RwLock<HashMap<FolderId, BTreeSet<FileId>>>,
}

/// Shared reference to an index.
pub type SharedIndex = Arc<Index>;

impl Index {
    /// Build an index from a loaded catalogue.
    ///
    /// Every file is registered under each of its effective folders.
    pub fn new(folders: Vec<Folder>, files: HashMap<FileId, File>) -> Self {
        let mut files_by_folder: HashMap<FolderId, BTreeSet<FileId>> = HashMap::new();
        for file in files.values() {
            for folder in file.effective_folders() {
                files_by_folder
                    .entry(folder)
                    .or_default()
                    .insert(file.id.clone());
            }
        }

        Self {
            tree: RwLock::new(Arc::new(FolderTree::new(folders))),
            files_by_id: RwLock::new(files),
            files_by_folder: RwLock::new(files_by_folder),
        }
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Current folder tree snapshot.
    pub fn tree(&self) -> Arc<FolderTree> {
        Arc::clone(&self.tree.read())
    }

    /// Clone of a file entry, whether or not it is visible.
    pub fn file(&self, id: &FileId) -> Option<File> {
        self.files_by_id.read().get(id).cloned()
    }

    /// Number of entries in `files_by_id`.
    pub fn file_count(&self) -> usize {
        self.files_by_id.read().len()
    }

    /// File ids currently recorded for `folder`, stale ones included.
    pub fn folder_file_ids(&self, folder: &FolderId) -> Vec<FileId> {
        self.files_by_folder
            .read()
            .get(folder)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Run `f` with both file maps read-locked.
    pub(crate) fn with_files<R>(
        &self,
        f: impl FnOnce(&HashMap<FileId, File>, &HashMap<FolderId, BTreeSet<FileId>>) -> R,
    ) -> R {
        let files = self.files_by_id.read();
        let by_folder = self.files_by_folder.read();
        f(&files, &by_folder)
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Insert or replace a file and union it into the reverse index under
    /// each of its effective folders.
    pub fn upsert_file(&self, file: File) {
        let mut files = self.files_by_id.write();
        let mut by_folder = self.files_by_folder.write();
        for folder in file.effective_folders() {
            by_folder.entry(folder).or_default().insert(file.id.clone());
        }
        files.insert(file.id.clone(), file);
    }

    /// Tombstone a file. The reverse index is left for lazy purging.
    pub fn remove_file(&self, id: &FileId) -> Option<File> {
        self.files_by_id.write().remove(id)
    }

    /// Swap in a new folder tree.
    pub fn replace_tree(&self, folders: Vec<Folder>) {
        let tree = Arc::new(FolderTree::new(folders));
        *self.tree.write() = tree;
    }

    /// Drop reverse-index entries for `folder` that are still stale.
    ///
    /// Each candidate is re-checked under the write lock, since the writer
    /// may have re-added it between the caller's read and this purge.
    /// Returns the number of entries removed.
    pub fn purge_stale(&self, folder: &FolderId, candidates: &[FileId]) -> usize {
        if candidates.is_empty() {
            return 0;
        }
        let files = self.files_by_id.read();
        let mut by_folder = self.files_by_folder.write();
        let Some(ids) = by_folder.get_mut(folder) else {
            return 0;
        };

        let mut removed = 0;
        for id in candidates {
            let still_stale = files.get(id).is_none_or(|file| !file.is_visible_in(folder));
            if still_stale && ids.remove(id) {
                removed += 1;
            }
        }
        if ids.is_empty() {
            by_folder.remove(folder);
        }
        removed
    }
}
