//! Bitmap Allocator (spec §4.2): lowest-free-first allocation over the
//! inode and block bitmaps, with the matching superblock free count kept
//! in lockstep.

use crate::error::{FsError, FsResult};
use crate::layout::{Image, INODE_TABLE_START_BLOCK};

/// Scans `bitmap` in ascending byte-then-bit order (LSB first within each
/// byte) for the first cleared bit below `limit`. `None` if all are set.
fn first_clear_bit(bitmap: &[u8], limit: u64) -> Option<u64> {
    for i in 0..limit {
        let byte = bitmap[(i / 8) as usize];
        if byte & (1 << (i % 8)) == 0 {
            return Some(i);
        }
    }
    None
}

fn set_bit(bitmap: &mut [u8], i: u64) {
    bitmap[(i / 8) as usize] |= 1 << (i % 8);
}

fn clear_bit(bitmap: &mut [u8], i: u64) {
    bitmap[(i / 8) as usize] &= !(1 << (i % 8));
}

fn bit_is_set(bitmap: &[u8], i: u64) -> bool {
    bitmap[(i / 8) as usize] & (1 << (i % 8)) != 0
}

/// Allocates the lowest-numbered free inode number. Does not touch the
/// on-disk inode record itself; callers write a fresh `Inode` afterward.
pub fn alloc_inode(img: &mut Image) -> FsResult<u32> {
    let sb = img.superblock();
    let i = first_clear_bit(img.inode_bitmap(), sb.inode_count as u64).ok_or(FsError::NoSpace)?;
    set_bit(img.inode_bitmap_mut(), i);
    let mut sb = img.superblock();
    sb.free_inode_count -= 1;
    img.set_superblock(&sb);
    Ok(i as u32)
}

pub fn free_inode(img: &mut Image, num: u32) {
    assert!(bit_is_set(img.inode_bitmap(), num as u64), "freeing an already-free inode");
    clear_bit(img.inode_bitmap_mut(), num as u64);
    let mut sb = img.superblock();
    sb.free_inode_count += 1;
    img.set_superblock(&sb);
}

/// Allocates a data block and returns its *physical* block index
/// (`4 + IB + bit`). The block is zeroed before being handed out — see
/// `SPEC_FULL.md` §9 item 2 (deviation from the unzeroed original).
pub fn alloc_block(img: &mut Image) -> FsResult<u64> {
    let sb = img.superblock();
    let b = first_clear_bit(img.block_bitmap(), sb.data_block_count).ok_or(FsError::NoSpace)?;
    set_bit(img.block_bitmap_mut(), b);
    let mut sb = img.superblock();
    sb.free_data_block_count -= 1;
    img.set_superblock(&sb);
    let physical = INODE_TABLE_START_BLOCK + sb.inode_blocks as u64 + b;
    img.zero_block(physical);
    Ok(physical)
}

/// All currently-free bit indices in the block bitmap, ascending. Used
/// by the extend path to group contiguous runs into single extents
/// (spec §4.5.2) rather than allocating one block at a time.
pub fn free_block_indices(img: &Image) -> Vec<u64> {
    let limit = img.superblock().data_block_count;
    let bitmap = img.block_bitmap();
    (0..limit).filter(|&i| !bit_is_set(bitmap, i)).collect()
}

/// Marks `count` consecutive block-bitmap bits starting at `first_bit`
/// as allocated, zeroes the backing blocks, and returns the physical
/// index of the first one. Callers (the extend path) have already
/// established these bits are free and contiguous.
pub fn claim_block_run(img: &mut Image, first_bit: u64, count: u64) -> u64 {
    let sb = img.superblock();
    let base = INODE_TABLE_START_BLOCK + sb.inode_blocks as u64;
    for i in 0..count {
        set_bit(img.block_bitmap_mut(), first_bit + i);
        img.zero_block(base + first_bit + i);
    }
    let mut sb = img.superblock();
    sb.free_data_block_count -= count;
    img.set_superblock(&sb);
    base + first_bit
}

pub fn free_block(img: &mut Image, physical: u64) {
    let sb = img.superblock();
    let base = INODE_TABLE_START_BLOCK + sb.inode_blocks as u64;
    assert!(physical >= base, "freeing a non-data block");
    let b = physical - base;
    assert!(bit_is_set(img.block_bitmap(), b), "freeing an already-free block");
    clear_bit(img.block_bitmap_mut(), b);
    let mut sb = img.superblock();
    sb.free_data_block_count += 1;
    img.set_superblock(&sb);
}
