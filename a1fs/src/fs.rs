//! Top-level engine type: one method per adapter-visible operation
//! (spec §6.2), composing the lower-level subsystems over a borrowed
//! image.

use log::warn;

use crate::error::{FsError, FsResult};
use crate::layout::{Image, Timespec, BLOCK_SIZE, MAGIC};
use crate::ops;

pub struct Attr {
    pub ino: u32,
    pub is_dir: bool,
    pub mode: u32,
    pub links: u32,
    pub size: u64,
    pub mtime: Timespec,
}

pub struct Statfs {
    pub block_size: u32,
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub total_inodes: u32,
    pub free_inodes: u32,
    pub name_max: u32,
}

/// Borrows the mapped image for the duration of one call. Stateless
/// beyond that borrow: every method re-resolves paths from the root, in
/// keeping with the engine having no cache of its own (spec §5).
pub struct A1fs<'a> {
    image: Image<'a>,
}

impl<'a> A1fs<'a> {
    /// Validates the superblock magic before returning a handle — every
    /// mount goes through this check, not only `statfs`.
    pub fn open(bytes: &'a mut [u8]) -> FsResult<Self> {
        let image = Image::new(bytes);
        if image.superblock().magic != MAGIC {
            return Err(FsError::CorruptImage);
        }
        Ok(A1fs { image })
    }

    pub fn getattr(&self, path: &str) -> FsResult<Attr> {
        let ino = crate::path::resolve(&self.image, path)?;
        let inode = self.image.inode(ino);
        Ok(Attr {
            ino,
            is_dir: crate::inode::Kind::of(&inode) == crate::inode::Kind::Directory,
            mode: inode.mode,
            links: inode.links,
            size: inode.size,
            mtime: inode.mtime,
        })
    }

    pub fn readdir(&self, path: &str) -> FsResult<Vec<(String, u32)>> {
        ops::readdir(&self.image, path)
    }

    pub fn mkdir(&mut self, path: &str, mode: u32) -> FsResult<u32> {
        ops::mkdir(&mut self.image, path, mode)
    }

    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        ops::rmdir(&mut self.image, path)
    }

    pub fn create(&mut self, path: &str, mode: u32) -> FsResult<u32> {
        ops::create(&mut self.image, path, mode)
    }

    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        ops::unlink(&mut self.image, path)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> FsResult<()> {
        ops::rename(&mut self.image, from, to)
    }

    pub fn utimens(&mut self, path: &str, mtime: Timespec) -> FsResult<()> {
        ops::utimens(&mut self.image, path, mtime)
    }

    pub fn truncate(&mut self, path: &str, new_size: u64) -> FsResult<()> {
        ops::truncate(&mut self.image, path, new_size)
    }

    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        ops::read(&self.image, path, buf, offset)
    }

    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> FsResult<usize> {
        ops::write(&mut self.image, path, buf, offset)
    }

    /// Re-checks the magic independent of whatever validation happened
    /// at `open` time — the one callback that, in the original, guards
    /// against a caller holding a handle over a since-corrupted backing
    /// file.
    pub fn statfs(&self) -> FsResult<Statfs> {
        let sb = self.image.superblock();
        if sb.magic != MAGIC {
            warn!("statfs: superblock magic mismatch");
            return Err(FsError::CorruptImage);
        }
        Ok(Statfs {
            block_size: BLOCK_SIZE as u32,
            total_blocks: sb.size / BLOCK_SIZE as u64,
            free_blocks: sb.free_data_block_count,
            total_inodes: sb.inode_count,
            free_inodes: sb.free_inode_count,
            name_max: crate::layout::NAME_MAX as u32,
        })
    }
}
