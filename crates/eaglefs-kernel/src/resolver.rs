//! Virtual path resolution over the [`Index`].
//!
//! Virtual paths are `/`-separated with empty segments ignored, so `""`, `"/"`
//! and `"//"` all name the root. Folders are matched by virtual name in
//! declared order, first match wins. Files are found by scanning the reverse
//! index of their parent folder.
//!
//! Listings are the only place stale reverse-index entries get purged.

use crate::ids::{FileId, FolderId};
use crate::index::{FolderTree, Index};
use crate::model::{File, Folder, Metadata};
use crate::vfs::{DirEntry, VfsError, VfsResult};

/// Split a virtual path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Walk `segments` down from the top-level folders.
fn walk<'t>(roots: &'t [Folder], segments: &[&str]) -> Option<&'t Folder> {
    let (first, rest) = segments.split_first()?;
    let mut folder = roots.iter().find(|f| f.virtual_name() == *first)?;
    for segment in rest {
        folder = folder
            .children
            .iter()
            .find(|f| f.virtual_name() == *segment)?;
    }
    Some(folder)
}

/// A folder resolved against one tree snapshot.
enum Resolved<'t> {
    Root,
    Folder(&'t Folder),
}

impl<'t> Resolved<'t> {
    fn id(&self) -> FolderId {
        match self {
            Resolved::Root => FolderId::root(),
            Resolved::Folder(folder) => folder.id.clone(),
        }
    }

    fn children(&self, tree: &'t FolderTree) -> &'t [Folder] {
        match *self {
            Resolved::Root => tree.roots(),
            Resolved::Folder(folder) => &folder.children,
        }
    }
}

fn resolve<'t>(tree: &'t FolderTree, segments: &[&str]) -> Option<Resolved<'t>> {
    if segments.is_empty() {
        return Some(Resolved::Root);
    }
    walk(tree.roots(), segments).map(Resolved::Folder)
}

impl Index {
    /// Resolve a virtual path to a folder id.
    ///
    /// The root path always yields [`FolderId::root()`].
    pub fn search_folder(&self, path: &str) -> Option<FolderId> {
        self.search_folder_segments(&segments(path))
    }

    /// Resolve a virtual path to a visible file id.
    ///
    /// Never mutates the index; stale entries are skipped, not purged.
    pub fn search_file(&self, path: &str) -> Option<FileId> {
        self.find_file(path).map(|file| file.id)
    }

    /// Like [`search_file`](Self::search_file) but returns the file itself.
    pub fn find_file(&self, path: &str) -> Option<File> {
        let segments = segments(path);
        let (name, parent) = segments.split_last()?;
        let folder = self.search_folder_segments(parent)?;

        self.with_files(|files, by_folder| {
            by_folder
                .get(&folder)?
                .iter()
                .filter_map(|id| files.get(id))
                .find(|file| file.is_visible_in(&folder) && file.virtual_name() == *name)
                .cloned()
        })
    }

    fn search_folder_segments(&self, segments: &[&str]) -> Option<FolderId> {
        let tree = self.tree();
        resolve(&tree, segments).map(|r| r.id())
    }

    /// Virtual names of a folder's children: folders first, then files.
    pub fn list_names(&self, path: &str) -> VfsResult<Vec<String>> {
        Ok(self
            .list_entries(path)?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    /// Like [`list_names`](Self::list_names) with each name tagged by kind.
    ///
    /// Member files that are no longer visible in the folder are left out and
    /// their reverse-index entries purged once enumeration is done.
    pub fn list_entries(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let tree = self.tree();
        let resolved =
            resolve(&tree, &segments(path)).ok_or_else(|| VfsError::not_found(path))?;
        let folder = resolved.id();

        let mut entries: Vec<DirEntry> = resolved
            .children(&tree)
            .iter()
            .map(|child| DirEntry::directory(child.virtual_name()))
            .collect();

        let mut stale = Vec::new();
        self.with_files(|files, by_folder| {
            let Some(ids) = by_folder.get(&folder) else {
                return;
            };
            for id in ids {
                match files.get(id) {
                    Some(file) if file.is_visible_in(&folder) => {
                        entries.push(DirEntry::file(file.virtual_name()));
                    }
                    _ => stale.push(id.clone()),
                }
            }
        });

        if !stale.is_empty() {
            let purged = self.purge_stale(&folder, &stale);
            tracing::debug!(folder = %folder, stale = stale.len(), purged, "purged stale folder entries");
        }

        Ok(entries)
    }

    /// Resolve a virtual path to the entity it names.
    pub fn get_metadata(&self, path: &str) -> VfsResult<Metadata> {
        let segments = segments(path);
        if segments.is_empty() {
            return Ok(Metadata::Root);
        }
        if let Some(file) = self.find_file(path) {
            return Ok(Metadata::File(file));
        }
        let tree = self.tree();
        match walk(tree.roots(), &segments) {
            Some(folder) => Ok(Metadata::Folder(folder.clone())),
            None => Err(VfsError::not_found(path)),
        }
    }
}
