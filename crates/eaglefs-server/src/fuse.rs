//! FUSE adapter over any [`VfsOps`] backend.
//!
//! Keeps a local inode ↔ virtual path table; the backend itself only knows
//! paths. Numbers are never reused. An inode handed out by `lookup` is
//! dropped once the kernel forgets every lookup of it; one only ever seen in
//! a `readdir` listing stays in the table until a later lookup and forget.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use eaglefs_kernel::{FileAttr, FileType, OpenFlags, VfsError, VfsOps};
use fuser::{
    BackgroundSession, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow,
};
use libc::{EACCES, EINVAL, EIO, ENOENT};
use parking_lot::RwLock;

use crate::constants::{ATTR_TTL, FS_NAME, ROOT_INODE};

/// Mount `backend` read-only at `mountpoint` on a background session.
///
/// Dropping the returned session unmounts.
pub fn mount<V: VfsOps + 'static>(
    backend: Arc<V>,
    mountpoint: &Path,
) -> anyhow::Result<BackgroundSession> {
    let options = [
        MountOption::FSName(FS_NAME.to_string()),
        MountOption::RO,
        MountOption::DefaultPermissions,
    ];
    let session = fuser::spawn_mount2(EagleFuse::new(backend), mountpoint, &options)?;
    Ok(session)
}

/// Map a backend error to an errno.
pub fn errno(e: &VfsError) -> i32 {
    match e {
        e if e.is_not_found() => ENOENT,
        VfsError::AccessDenied(_) | VfsError::ReadOnly => EACCES,
        _ => EIO,
    }
}

/// Join a child name onto a virtual parent path.
pub fn join_child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Decode `open(2)` flags.
pub fn open_flags(flags: i32) -> OpenFlags {
    let access = flags & libc::O_ACCMODE;
    OpenFlags {
        read: access == libc::O_RDONLY || access == libc::O_RDWR,
        write: access == libc::O_WRONLY || access == libc::O_RDWR,
        append: flags & libc::O_APPEND != 0,
        create: flags & libc::O_CREAT != 0,
        truncate: flags & libc::O_TRUNC != 0,
    }
}

/// Kernel-facing attributes for `attr` under inode `ino`.
pub fn file_attr(ino: u64, attr: &FileAttr) -> fuser::FileAttr {
    let kind = match attr.kind {
        FileType::Directory => fuser::FileType::Directory,
        FileType::File => fuser::FileType::RegularFile,
    };
    let atime = attr.atime.unwrap_or(attr.mtime);
    let ctime = attr.ctime.unwrap_or(attr.mtime);
    fuser::FileAttr {
        ino,
        size: attr.size,
        blocks: attr.size.div_ceil(512),
        atime,
        mtime: attr.mtime,
        ctime,
        crtime: ctime,
        kind,
        perm: attr.perm as u16,
        nlink: attr.nlink,
        uid: attr.uid.unwrap_or(0),
        gid: attr.gid.unwrap_or(0),
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

/// Inode ↔ path table with kernel lookup counts.
struct InodeTable {
    by_path: HashMap<String, u64>,
    by_ino: HashMap<u64, InodeEntry>,
    next_ino: u64,
}

struct InodeEntry {
    path: String,
    lookups: u64,
}

impl InodeTable {
    fn new() -> Self {
        let mut table = Self {
            by_path: HashMap::new(),
            by_ino: HashMap::new(),
            next_ino: ROOT_INODE + 1,
        };
        table.by_path.insert("/".to_string(), ROOT_INODE);
        table.by_ino.insert(
            ROOT_INODE,
            InodeEntry {
                path: "/".to_string(),
                lookups: 0,
            },
        );
        table
    }

    fn get(&self, path: &str) -> Option<u64> {
        self.by_path.get(path).copied()
    }

    fn path(&self, ino: u64) -> Option<&str> {
        self.by_ino.get(&ino).map(|entry| entry.path.as_str())
    }

    fn ensure(&mut self, path: &str) -> u64 {
        if let Some(ino) = self.get(path) {
            return ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.by_path.insert(path.to_string(), ino);
        self.by_ino.insert(
            ino,
            InodeEntry {
                path: path.to_string(),
                lookups: 0,
            },
        );
        ino
    }

    /// `ensure` plus one kernel reference.
    fn lookup(&mut self, path: &str) -> u64 {
        let ino = self.ensure(path);
        if let Some(entry) = self.by_ino.get_mut(&ino) {
            entry.lookups += 1;
        }
        ino
    }

    /// Drop `nlookup` kernel references; returns whether the inode went away.
    fn forget(&mut self, ino: u64, nlookup: u64) -> bool {
        if ino == ROOT_INODE {
            return false;
        }
        let Some(entry) = self.by_ino.get_mut(&ino) else {
            return false;
        };
        entry.lookups = entry.lookups.saturating_sub(nlookup);
        if entry.lookups > 0 {
            return false;
        }
        if let Some(entry) = self.by_ino.remove(&ino) {
            self.by_path.remove(&entry.path);
        }
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.by_ino.len()
    }
}

pub struct EagleFuse<V> {
    backend: Arc<V>,
    inodes: RwLock<InodeTable>,
}

impl<V: VfsOps> EagleFuse<V> {
    pub fn new(backend: Arc<V>) -> Self {
        Self {
            backend,
            inodes: RwLock::new(InodeTable::new()),
        }
    }

    fn ensure_inode(&self, path: &str) -> u64 {
        if let Some(ino) = self.inodes.read().get(path) {
            return ino;
        }
        self.inodes.write().ensure(path)
    }

    fn path_for_ino(&self, ino: u64) -> Option<String> {
        self.inodes.read().path(ino).map(str::to_string)
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Option<String> {
        let parent = self.path_for_ino(parent)?;
        Some(join_child_path(&parent, name.to_str()?))
    }
}

impl<V: VfsOps> Filesystem for EagleFuse<V> {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(ENOENT);
            return;
        };
        match self.backend.getattr(Path::new(&path)) {
            Ok(attr) => {
                let ino = self.inodes.write().lookup(&path);
                reply.entry(&ATTR_TTL, &file_attr(ino, &attr), 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        if self.inodes.write().forget(ino, nlookup) {
            tracing::trace!(ino, "inode forgotten");
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(path) = self.path_for_ino(ino) else {
            reply.error(ENOENT);
            return;
        };
        match self.backend.getattr(Path::new(&path)) {
            Ok(attr) => reply.attr(&ATTR_TTL, &file_attr(ino, &attr)),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_for_ino(ino) else {
            reply.error(ENOENT);
            return;
        };
        let entries = match self.backend.readdir(Path::new(&path)) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(errno(&e));
                return;
            }
        };

        let mut all = Vec::with_capacity(entries.len() + 2);
        all.push((ino, fuser::FileType::Directory, ".".to_string()));
        all.push((ino, fuser::FileType::Directory, "..".to_string()));
        for entry in entries {
            let child_ino = self.ensure_inode(&join_child_path(&path, &entry.name));
            let kind = if entry.kind.is_dir() {
                fuser::FileType::Directory
            } else {
                fuser::FileType::RegularFile
            };
            all.push((child_ino, kind, entry.name));
        }

        let start = usize::try_from(offset).unwrap_or(0);
        for (i, (child_ino, kind, name)) in all.into_iter().enumerate().skip(start) {
            if reply.add(child_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path_for_ino(ino) else {
            reply.error(ENOENT);
            return;
        };
        match self.backend.open(Path::new(&path), open_flags(flags)) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(EINVAL);
            return;
        };
        let Some(path) = self.path_for_ino(ino) else {
            reply.error(ENOENT);
            return;
        };
        match self.backend.read(Path::new(&path), offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        match self.backend.statfs() {
            Ok(s) => reply.statfs(
                s.blocks, s.bfree, s.bavail, s.files, s.ffree, s.bsize, s.namelen, s.frsize,
            ),
            Err(e) => reply.error(errno(&e)),
        }
    }

    // ========================================================================
    // Mutations: all rejected
    // ========================================================================

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _offset: i64,
        _data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        reply.error(EACCES);
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        reply.error(EACCES);
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        reply.error(EACCES);
    }

    fn unlink(&mut self, _req: &Request<'_>, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(EACCES);
    }

    fn rmdir(&mut self, _req: &Request<'_>, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(EACCES);
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        _parent: u64,
        _name: &OsStr,
        _newparent: u64,
        _newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        reply.error(EACCES);
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        reply.error(EACCES);
    }
}
