//! Binary configuration constants.

use std::time::Duration;

/// Filesystem name reported to the mount table.
pub const FS_NAME: &str = "eaglefs";

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// How long the kernel may cache attributes and entries we hand out.
///
/// Short, since the library changes underneath us.
pub const ATTR_TTL: Duration = Duration::from_secs(1);

/// Inode of the mount root.
pub const ROOT_INODE: u64 = 1;

/// Chunk size used by `cat` when streaming a whole file.
pub const CAT_CHUNK_SIZE: u64 = 64 * 1024;
