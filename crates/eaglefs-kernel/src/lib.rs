//! # eaglefs-kernel
//!
//! Metadata index and live reconciliation for a media library exposed as a
//! read-only virtual filesystem.
//!
//! A library on disk is a folder-tree document plus one storage unit per
//! item. The kernel:
//! - Loads both into an in-memory [`Index`]
//! - Resolves virtual paths (`/A_F1/photo_X1.png`) to folders and files
//! - Serves payload bytes verbatim from item storage
//! - Follows library edits through a background [`Reconciler`] without a
//!   remount

pub mod catalogue;
pub mod config;
pub mod content;
pub mod ids;
pub mod index;
pub mod layout;
pub mod library;
pub mod model;
pub mod reconciler;
pub mod resolver;
pub mod vfs;
pub mod watcher;

pub use config::{LibraryConfig, WatchConfig};
pub use ids::{FileId, FolderId, ROOT_FOLDER_ID};
pub use index::{FolderTree, Index, SharedIndex};
pub use layout::{LibraryLayout, extract_item_id};
pub use library::{Library, LibraryStats};
pub use model::{File, Folder, Metadata};
pub use reconciler::{BatchOutcome, Change, ChangeKind, ItemOutcome, Reconciler};
pub use vfs::{DirEntry, FileAttr, FileType, OpenFlags, StatFs, VfsError, VfsOps, VfsResult};
pub use watcher::{WatcherHandle, start_watcher};
