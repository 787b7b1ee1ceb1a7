//! Payload access: resolve a virtual path and read bytes from the item's
//! binary payload.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::index::Index;
use crate::layout::LibraryLayout;
use crate::vfs::{VfsError, VfsResult};

/// Read up to `max_length` bytes at `offset` from a file on disk.
///
/// Fewer bytes come back at end of file, none at or past it.
pub fn read_range(path: &Path, offset: u64, max_length: u64) -> VfsResult<Vec<u8>> {
    let mut file = fs::File::open(path).map_err(|e| VfsError::unavailable(path, e))?;
    file.seek(SeekFrom::Start(offset))?;

    let mut buf = Vec::new();
    file.take(max_length).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Read bytes of the file named by `virtual_path`.
///
/// The payload lives at `images/<id>.info/<stored name>[.<ext>]`.
pub fn read_bytes(
    index: &Index,
    layout: &LibraryLayout,
    virtual_path: &str,
    offset: u64,
    max_length: u64,
) -> VfsResult<Vec<u8>> {
    let file = index
        .find_file(virtual_path)
        .ok_or_else(|| VfsError::not_found(virtual_path))?;
    let payload = layout.payload_path(&file);

    tracing::trace!(path = %payload.display(), offset, max_length, "reading payload");
    read_range(&payload, offset, max_length)
}
