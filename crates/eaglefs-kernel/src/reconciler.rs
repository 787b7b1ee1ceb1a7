//! Incremental reconciliation of the index against library changes.
//!
//! A batch is a set of `(kind, library-relative path)` pairs with no ordering
//! guarantee and possible redelivery. Processing is keyed on item ids, never
//! on the change kind: for each touched item the sidecar is re-read and its
//! presence alone decides between upsert and tombstone. That makes a batch
//! idempotent and lets a later batch always win over an earlier one.
//!
//! ```text
//! batch ──► classify ──► item ids (deduplicated) ──► re-read sidecar ──► upsert / tombstone
//!                   └──► metadata.json touched ──► reload folder tree
//! ```

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use crate::catalogue::{load_folder_tree, read_sidecar};
use crate::ids::FileId;
use crate::index::SharedIndex;
use crate::layout::{LibraryLayout, extract_item_id, is_folder_tree_document};
use crate::vfs::{VfsError, VfsResult};

/// Kind of change reported by the notification backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Entry was created.
    Created,
    /// Entry was modified (content, metadata, or renamed).
    Modified,
    /// Entry was deleted.
    Deleted,
}

/// One change notification, relative to the library root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl Change {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Created, path)
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Modified, path)
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Deleted, path)
    }
}

/// A batch split into the work it implies.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Classified {
    /// Distinct items touched under the item-storage directory.
    pub items: BTreeSet<FileId>,
    /// Whether the folder-tree document was touched.
    pub tree_changed: bool,
    /// Changes that imply no work.
    pub ignored: usize,
}

/// Partition a batch into item changes and other changes.
pub fn classify<'a>(changes: impl IntoIterator<Item = &'a Change>) -> Classified {
    let mut out = Classified::default();
    for change in changes {
        if let Some(id) = extract_item_id(&change.path) {
            out.items.insert(id);
        } else if is_folder_tree_document(&change.path) {
            out.tree_changed = true;
        } else {
            out.ignored += 1;
        }
    }
    out
}

/// What happened to one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Sidecar parsed and the entry replaced.
    Updated,
    /// Sidecar gone, entry tombstoned.
    Removed,
    /// Sidecar unreadable or malformed; the previous entry stands.
    Skipped,
}

/// Summary of one applied batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub updated: usize,
    pub removed: usize,
    pub skipped: usize,
    pub ignored: usize,
    pub tree_reloaded: bool,
}

impl BatchOutcome {
    /// Whether the batch changed anything in the index.
    pub fn is_noop(&self) -> bool {
        self.updated == 0 && self.removed == 0 && !self.tree_reloaded
    }
}

/// The index's only writer after startup.
#[derive(Debug, Clone)]
pub struct Reconciler {
    layout: LibraryLayout,
    index: SharedIndex,
}

impl Reconciler {
    pub fn new(layout: LibraryLayout, index: SharedIndex) -> Self {
        Self { layout, index }
    }

    pub fn layout(&self) -> &LibraryLayout {
        &self.layout
    }

    /// Make an absolute notification path library-relative.
    ///
    /// Relative paths pass through; absolute paths outside the root are
    /// dropped.
    pub fn normalize(&self, path: &Path) -> Option<PathBuf> {
        if path.is_relative() {
            return Some(path.to_path_buf());
        }
        self.layout.relative(path).map(Path::to_path_buf)
    }

    /// Apply one batch of library-relative changes.
    ///
    /// Blocking: reads sidecars and possibly the folder tree.
    pub fn apply_batch(&self, changes: &[Change]) -> BatchOutcome {
        let classified = classify(changes);
        let mut outcome = BatchOutcome {
            ignored: classified.ignored,
            ..BatchOutcome::default()
        };

        for id in &classified.items {
            match self.reconcile_item(id) {
                ItemOutcome::Updated => outcome.updated += 1,
                ItemOutcome::Removed => outcome.removed += 1,
                ItemOutcome::Skipped => outcome.skipped += 1,
            }
        }

        if classified.tree_changed {
            match self.reload_tree() {
                Ok(()) => outcome.tree_reloaded = true,
                Err(e) => {
                    tracing::warn!(error = %e, "folder tree reload failed, keeping previous tree");
                }
            }
        }

        outcome
    }

    /// Re-derive one item from its sidecar.
    pub fn reconcile_item(&self, id: &FileId) -> ItemOutcome {
        let sidecar = self.layout.sidecar_path(id);
        match read_sidecar(&sidecar) {
            Ok(file) => {
                if &file.id != id {
                    tracing::warn!(
                        id = %id,
                        declared = %file.id,
                        "sidecar id differs from its storage unit"
                    );
                }
                tracing::trace!(id = %file.id, deleted = file.is_deleted, "upserting item");
                self.index.upsert_file(file);
                ItemOutcome::Updated
            }
            Err(VfsError::StorageUnavailable { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                let existed = self.index.remove_file(id).is_some();
                tracing::trace!(id = %id, existed, "tombstoned item");
                ItemOutcome::Removed
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "skipping item this batch");
                ItemOutcome::Skipped
            }
        }
    }

    /// Reload the whole folder tree and swap it in.
    pub fn reload_tree(&self) -> VfsResult<()> {
        let folders = load_folder_tree(&self.layout)?;
        self.index.replace_tree(folders);
        tracing::debug!("folder tree reloaded");
        Ok(())
    }
}
