//! Kernel-Bridge Adapter (spec §2 item 10, detailed in `SPEC_FULL.md`
//! §4.9): a thin `fuser::Filesystem` implementation that turns FUSE's
//! inode-number callback protocol into calls on the path-based engine.
//!
//! No filesystem invariant lives here. The only state this module owns
//! is a `HashMap` from FUSE inode number to absolute path, used purely
//! to answer "what path does this `ino` refer to" for a callback that
//! doesn't carry one — it is rebuilt from directory contents via
//! `lookup`/`readdir`, never an independent source of truth.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use log::warn;

use crate::error::FsError;
use crate::fs::{Attr, A1fs};
use crate::layout::Timespec;

const TTL: Duration = Duration::from_secs(1);
const ROOT_FUSE_INO: u64 = 1;

fn errno(e: FsError) -> libc::c_int {
    match e {
        FsError::NoEntry => libc::ENOENT,
        FsError::NotADirectory => libc::ENOTDIR,
        FsError::NameTooLong => libc::ENAMETOOLONG,
        FsError::NotEmpty => libc::ENOTEMPTY,
        FsError::NoSpace => libc::ENOSPC,
        FsError::OutOfMemory => libc::ENOMEM,
        FsError::CorruptImage => libc::EIO,
    }
}

fn to_file_attr(attr: &Attr, fuse_ino: u64) -> FileAttr {
    let mtime = timespec_to_systemtime(attr.mtime);
    FileAttr {
        ino: fuse_ino,
        size: attr.size,
        blocks: (attr.size + 4095) / 4096,
        atime: mtime,
        mtime,
        ctime: mtime,
        crtime: mtime,
        kind: if attr.is_dir { FileType::Directory } else { FileType::RegularFile },
        perm: (attr.mode & 0o7777) as u16,
        nlink: attr.links,
        uid: 0,
        gid: 0,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}

fn timespec_to_systemtime(ts: Timespec) -> SystemTime {
    if ts.sec >= 0 {
        UNIX_EPOCH + Duration::new(ts.sec as u64, ts.nsec.max(0) as u32)
    } else {
        UNIX_EPOCH
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Path-length enforcement is the adapter's job, not the engine's (spec
/// §4.1) — the engine just resolves whatever `&str` it's handed.
fn check_path_len(path: &str) -> Result<(), libc::c_int> {
    if path.len() >= crate::layout::PATH_MAX {
        Err(libc::ENAMETOOLONG)
    } else {
        Ok(())
    }
}

/// Owns the memory-mapped image and the engine borrowing it, plus the
/// ino-to-path lookup cache described above.
pub struct A1fsAdapter<'a> {
    fs: A1fs<'a>,
    paths: HashMap<u64, String>,
}

impl<'a> A1fsAdapter<'a> {
    pub fn new(fs: A1fs<'a>) -> Self {
        let mut paths = HashMap::new();
        paths.insert(ROOT_FUSE_INO, "/".to_string());
        A1fsAdapter { fs, paths }
    }

    fn path_of(&self, ino: u64) -> Option<&str> {
        self.paths.get(&ino).map(String::as_str)
    }

    fn remember(&mut self, engine_ino: u32, path: String) -> u64 {
        let fuse_ino = engine_ino as u64 + 1;
        self.paths.insert(fuse_ino, path);
        fuse_ino
    }
}

impl<'a> Filesystem for A1fsAdapter<'a> {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(parent_path) = self.path_of(parent).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        let name = name.to_string_lossy().to_string();
        let child_path = join(&parent_path, &name);
        if let Err(errno) = check_path_len(&child_path) {
            reply.error(errno);
            return;
        }
        match self.fs.getattr(&child_path) {
            Ok(attr) => {
                let fuse_ino = self.remember(attr.ino, child_path);
                reply.entry(&TTL, &to_file_attr(&attr, fuse_ino), 0);
            }
            Err(e) => reply.error(errno(e)),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &to_file_attr(&attr, ino)),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(path) = self.path_of(ino).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        if let Some(new_size) = size {
            if let Err(e) = self.fs.truncate(&path, new_size) {
                reply.error(errno(e));
                return;
            }
        }
        if mtime.is_some() || atime.is_some() {
            let now = std::time::SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            let ts = Timespec { sec: now.as_secs() as i64, nsec: now.subsec_nanos() as i64 };
            if let Err(e) = self.fs.utimens(&path, ts) {
                reply.error(errno(e));
                return;
            }
        }
        match self.fs.getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &to_file_attr(&attr, ino)),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn readdir(&mut self, _req: &Request, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let Some(path) = self.path_of(ino).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        let entries = match self.fs.readdir(&path) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(errno(e));
                return;
            }
        };
        for (i, (name, engine_ino)) in entries.into_iter().enumerate().skip(offset as usize) {
            let child_path = if name == "." {
                path.clone()
            } else if name == ".." {
                parent_of(&path)
            } else {
                join(&path, &name)
            };
            let is_dir = self.fs.getattr(&child_path).map(|a| a.is_dir).unwrap_or(true);
            let fuse_ino = self.remember(engine_ino, child_path);
            let kind = if is_dir { FileType::Directory } else { FileType::RegularFile };
            if reply.add(fuse_ino, (i + 1) as i64, kind, "") {
                // Adapter buffer full: spec's OUT_OF_MEMORY termination
                // condition. fuser's `add` returning true already means
                // "stop", so there's nothing further to propagate.
                break;
            }
        }
        reply.ok();
    }

    fn mkdir(&mut self, _req: &Request, parent: u64, name: &OsStr, mode: u32, _umask: u32, reply: ReplyEntry) {
        let Some(parent_path) = self.path_of(parent).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        let child_path = join(&parent_path, &name.to_string_lossy());
        if let Err(errno) = check_path_len(&child_path) {
            reply.error(errno);
            return;
        }
        match self.fs.mkdir(&child_path, mode) {
            Ok(engine_ino) => {
                let fuse_ino = self.remember(engine_ino, child_path.clone());
                match self.fs.getattr(&child_path) {
                    Ok(attr) => reply.entry(&TTL, &to_file_attr(&attr, fuse_ino), 0),
                    Err(e) => reply.error(errno(e)),
                }
            }
            Err(e) => reply.error(errno(e)),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_of(parent).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        let child_path = join(&parent_path, &name.to_string_lossy());
        if let Err(errno) = check_path_len(&child_path) {
            reply.error(errno);
            return;
        }
        match self.fs.rmdir(&child_path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(parent_path) = self.path_of(parent).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        let child_path = join(&parent_path, &name.to_string_lossy());
        if let Err(errno) = check_path_len(&child_path) {
            reply.error(errno);
            return;
        }
        match self.fs.create(&child_path, mode) {
            Ok(engine_ino) => {
                let fuse_ino = self.remember(engine_ino, child_path.clone());
                match self.fs.getattr(&child_path) {
                    Ok(attr) => reply.created(&TTL, &to_file_attr(&attr, fuse_ino), 0, 0, 0),
                    Err(e) => reply.error(errno(e)),
                }
            }
            Err(e) => reply.error(errno(e)),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_of(parent).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        let child_path = join(&parent_path, &name.to_string_lossy());
        if let Err(errno) = check_path_len(&child_path) {
            reply.error(errno);
            return;
        }
        match self.fs.unlink(&child_path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (Some(from_parent), Some(to_parent)) =
            (self.path_of(parent).map(str::to_string), self.path_of(newparent).map(str::to_string))
        else {
            reply.error(libc::ENOENT);
            return;
        };
        let from = join(&from_parent, &name.to_string_lossy());
        let to = join(&to_parent, &newname.to_string_lossy());
        if let Err(errno) = check_path_len(&from).and_then(|_| check_path_len(&to)) {
            reply.error(errno);
            return;
        }
        match self.fs.rename(&from, &to) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_of(ino).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        let mut buf = vec![0u8; size as usize];
        match self.fs.read(&path, &mut buf, offset as u64) {
            Ok(n) => reply.data(&buf[..n.min(buf.len())]),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_of(ino).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.write(&path, data, offset as u64) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        match self.fs.statfs() {
            Ok(s) => reply.statfs(
                s.total_blocks,
                s.free_blocks,
                s.free_blocks,
                (s.total_inodes - s.free_inodes) as u64,
                s.free_inodes as u64,
                s.block_size,
                s.name_max,
                s.block_size,
            ),
            Err(e) => {
                warn!("statfs failed: {e}");
                reply.error(errno(e));
            }
        }
    }
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => "/".to_string(),
    }
}
