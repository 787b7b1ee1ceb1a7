//! VFS error types.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Virtual path does not resolve to a folder or file.
    #[error("not found: {0}")]
    NotFound(String),

    /// Open requested an access mode other than read-only.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Filesystem is read-only.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// A sidecar or the folder-tree document failed to parse.
    #[error("corrupt metadata in {path}: {source}")]
    CorruptMetadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Library root or an item-storage directory could not be reached.
    #[error("storage unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AccessDenied error.
    pub fn access_denied(path: impl Into<String>) -> Self {
        Self::AccessDenied(path.into())
    }

    /// Create a CorruptMetadata error.
    pub fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::CorruptMetadata {
            path: path.into(),
            source,
        }
    }

    /// Create a StorageUnavailable error.
    pub fn unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::StorageUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether the caller should see this as a missing entry.
    ///
    /// Unreachable storage has no remediation on a read-only view, so it
    /// looks the same as an unresolved path.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VfsError::NotFound(_) | VfsError::StorageUnavailable { .. }
        )
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AccessDenied(msg) => io::Error::new(io::ErrorKind::PermissionDenied, msg),
            VfsError::ReadOnly => {
                io::Error::new(io::ErrorKind::PermissionDenied, "filesystem is read-only")
            }
            e @ VfsError::CorruptMetadata { .. } => {
                io::Error::new(io::ErrorKind::InvalidData, e.to_string())
            }
            e @ VfsError::StorageUnavailable { .. } => {
                io::Error::new(io::ErrorKind::NotFound, e.to_string())
            }
            VfsError::Io(e) => e,
            VfsError::Other(msg) => io::Error::other(msg),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
