//! Virtual Filesystem surface.
//!
//! This module is the boundary the filesystem dispatch layer talks to.
//! Key components:
//!
//! - [`VfsOps`] - Core trait for filesystem operations
//! - [`VfsError`] - Error kinds surfaced to callers
//! - [`FileAttr`] / [`DirEntry`] - stat-like records and listings
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: Operations use virtual paths, not inode
//!   numbers. FUSE adapters handle inode ↔ path mapping locally.
//! - **Explicit offset/size**: Reads take offset and size so no handle state
//!   is needed.
//! - **Read-only by default**: every mutating call is rejected uniformly.

mod error;
mod ops;
mod types;

pub use error::{VfsError, VfsResult};
pub use ops::VfsOps;
pub use types::{DirEntry, FileAttr, FileType, OpenFlags, StatFs};
