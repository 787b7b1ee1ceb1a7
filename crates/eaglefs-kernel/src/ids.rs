//! Typed identifiers for library folders and files.
//!
//! Both wrap the opaque string ids the library application assigns. They are
//! never parsed or generated here, only compared and displayed. Keeping the
//! two namespaces in separate types stops a folder id from being used to look
//! up a file (and vice versa) at compile time.
//!
//! `FolderId::root()` is the sentinel for the virtual top-level directory. It
//! never appears in the on-disk folder tree.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Literal value of the virtual root folder id.
pub const ROOT_FOLDER_ID: &str = "root";

/// A folder identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(String);

/// A file (library item) identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Wrap a raw id string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The raw id string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into the raw id string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $T {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $T {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $T {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $T {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.0)
            }
        }
    };
}

impl_typed_id!(FolderId, "FolderId");
impl_typed_id!(FileId, "FileId");

impl FolderId {
    /// The virtual root folder.
    pub fn root() -> Self {
        Self(ROOT_FOLDER_ID.to_string())
    }

    /// Check if this is the virtual root folder.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_FOLDER_ID
    }
}
