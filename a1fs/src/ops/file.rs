//! File Data Engine (spec §4.5): truncate, positional read, positional
//! write.

use crate::bitmap;
use crate::error::{FsError, FsResult};
use crate::extent;
use crate::inode;
use crate::layout::{Image, BLOCK_SIZE};
use crate::path;

fn blocks_for(bytes: u64) -> u64 {
    (bytes + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64
}

/// Extend branch of truncate: takes the sorted list of free block-bitmap
/// positions, groups it into maximal runs of consecutive indices, and
/// commits one extent per run until `need` blocks are allocated (spec
/// §4.5.2). Each run is capped at what's still needed, so a long run of
/// free space can satisfy several extend calls without being consumed
/// all at once.
fn extend(img: &mut Image, ino: u32, need: u64) -> FsResult<()> {
    if need > img.superblock().free_data_block_count {
        return Err(FsError::OutOfMemory);
    }
    let free = bitmap::free_block_indices(img);
    let mut remaining = need;
    let mut i = 0usize;
    while remaining > 0 {
        let free_slot = inode::first_free_extent_slot(&img.inode(ino)).ok_or(FsError::NoSpace)?;
        let run_start = free[i];
        let mut run_len = 1u64;
        while i + (run_len as usize) < free.len()
            && free[i + run_len as usize] == run_start + run_len
            && run_len < remaining
        {
            run_len += 1;
        }
        let physical = bitmap::claim_block_run(img, run_start, run_len);
        let extent_slot = extent::alloc_extent(img, physical as u32, run_len as u32)?;
        let mut updated = img.inode(ino);
        updated.extents[free_slot] = extent_slot;
        img.set_inode(ino, &updated);
        remaining -= run_len;
        i += run_len as usize;
    }
    Ok(())
}

fn shrink(img: &mut Image, ino: u32, new_size: u64, old_size: u64) {
    let target = blocks_for(new_size);
    let current = blocks_for(old_size);
    let mut drop = current - target;

    if drop == 0 {
        zero_tail(img, ino, new_size, old_size);
        let mut updated = img.inode(ino);
        updated.size = new_size;
        img.set_inode(ino, &updated);
        return;
    }

    while drop > 0 {
        let mut inode = img.inode(ino);
        let slot = inode::last_used_extent_slot(&inode).expect("drop exceeds allocated blocks");
        let extent_slot = inode.extents[slot];
        let mut e = img.extent(extent_slot);

        let last_block = e.start as u64 + e.count as u64 - 1;
        img.zero_block(last_block);
        bitmap::free_block(img, last_block);
        e.count -= 1;
        drop -= 1;

        if e.count == 0 {
            extent::free_extent(img, extent_slot);
            inode.extents[slot] = 0;
        } else {
            img.set_extent(extent_slot, e);
        }
        img.set_inode(ino, &inode);
    }

    let mut updated = img.inode(ino);
    updated.size = new_size;
    img.set_inode(ino, &updated);
}

fn zero_tail(img: &mut Image, ino: u32, new_size: u64, old_size: u64) {
    if new_size >= old_size {
        return;
    }
    let block_idx = new_size / BLOCK_SIZE as u64;
    let inode = img.inode(ino);
    let blocks = inode::block_list(img, &inode);
    let Some(&physical) = blocks.get(block_idx as usize) else { return };
    let start = (new_size % BLOCK_SIZE as u64) as usize;
    let end = if (old_size / BLOCK_SIZE as u64) == block_idx {
        (old_size % BLOCK_SIZE as u64) as usize
    } else {
        BLOCK_SIZE
    };
    img.block_mut(physical)[start..end].fill(0);
}

pub fn truncate(img: &mut Image, path: &str, new_size: u64) -> FsResult<()> {
    let ino = path::resolve(img, path)?;
    let old = img.inode(ino).size;
    if new_size > old {
        // "Additional blocks" is a capacity deficit, not a raw byte-delta
        // conversion: `create` already reserves one block of unused
        // capacity for a brand new file, and extend must account for it
        // rather than stranding it while allocating a full new set on
        // top (see `DESIGN.md`).
        let have = inode::capacity_blocks(img, &img.inode(ino));
        let want = blocks_for(new_size);
        if want > have {
            extend(img, ino, want - have)?;
        }
        let mut updated = img.inode(ino);
        updated.size = new_size;
        img.set_inode(ino, &updated);
    } else if new_size < old {
        shrink(img, ino, new_size, old);
    }
    Ok(())
}

/// Bytes requested past `inode.size` are delivered as zero rather than
/// truncating the return value to the real data available — this is
/// what lets scenario 5 (`SPEC_FULL.md` §8) observe a full-length
/// zero-padded read through a hole that was never allocated. A request
/// that starts at or past EOF is the one case that short-reads to 0,
/// matching spec §4.5.3 literally.
pub fn read(img: &Image, path: &str, buf: &mut [u8], offset: u64) -> FsResult<usize> {
    let ino = path::resolve(img, path)?;
    let inode = img.inode(ino);
    if offset >= inode.size {
        return Ok(0);
    }
    let requested = buf.len();
    let to_read = std::cmp::min(requested as u64, inode.size - offset) as usize;
    let blocks = inode::block_list(img, &inode);

    let mut produced = 0usize;
    let mut block_index = offset / BLOCK_SIZE as u64;
    let mut intra = (offset % BLOCK_SIZE as u64) as usize;
    while produced < to_read {
        let physical = blocks[block_index as usize];
        let chunk = std::cmp::min(BLOCK_SIZE - intra, to_read - produced);
        buf[produced..produced + chunk].copy_from_slice(&img.block(physical)[intra..intra + chunk]);
        produced += chunk;
        block_index += 1;
        intra = 0;
    }
    buf[to_read..requested].fill(0);
    Ok(requested)
}

pub fn write(img: &mut Image, path: &str, buf: &[u8], offset: u64) -> FsResult<usize> {
    let ino = path::resolve(img, path)?;
    let old_size = img.inode(ino).size;
    let needed_size = offset + buf.len() as u64;
    if needed_size > old_size {
        // spec §4.5.4: any failure of the implicit extend is surfaced as
        // NO_SPACE to the caller, not whatever error truncate produced.
        truncate(img, path, needed_size).map_err(|_| FsError::NoSpace)?;
    }

    let inode = img.inode(ino);
    let blocks = inode::block_list(img, &inode);
    let mut written = 0usize;
    let mut block_index = offset / BLOCK_SIZE as u64;
    let mut intra = (offset % BLOCK_SIZE as u64) as usize;
    while written < buf.len() {
        let physical = blocks[block_index as usize];
        let chunk = std::cmp::min(BLOCK_SIZE - intra, buf.len() - written);
        img.block_mut(physical)[intra..intra + chunk].copy_from_slice(&buf[written..written + chunk]);
        written += chunk;
        block_index += 1;
        intra = 0;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_image;
    use crate::ops::dir::create;

    fn fresh(n_inodes: u32, blocks: u64) -> Vec<u8> {
        let mut buf = vec![0u8; (blocks * 4096) as usize];
        format_image(&mut buf, n_inodes).unwrap();
        buf
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        create(&mut img, "/f", 0o644).unwrap();
        write(&mut img, "/f", b"hello", 0).unwrap();
        let mut out = [0u8; 5];
        let n = read(&img, "/f", &mut out, 0).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&out, b"hello");
        assert_eq!(img.inode(path::resolve(&img, "/f").unwrap()).size, 5);
    }

    #[test]
    fn truncate_extend_zero_fills() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        create(&mut img, "/f", 0o644).unwrap();
        truncate(&mut img, "/f", 10_000).unwrap();
        let mut out = [0xFFu8; 10_000];
        let n = read(&img, "/f", &mut out, 0).unwrap();
        assert_eq!(n, 10_000);
        assert!(out.iter().all(|&b| b == 0));
        let ino = path::resolve(&img, "/f").unwrap();
        let blocks = inode::block_list(&img, &img.inode(ino));
        assert_eq!(blocks.len(), 3);
    }

    #[test]
    fn truncate_shrink_zeroes_hole_and_frees_blocks() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        create(&mut img, "/f", 0o644).unwrap();
        let payload = vec![b'A'; 3 * 4096]; // "AAA" * 4096, spec §8 scenario 5
        write(&mut img, "/f", &payload, 0).unwrap();
        let free_before = img.superblock().free_data_block_count;
        truncate(&mut img, "/f", 1).unwrap();
        let mut out = [0xFFu8; 4096];
        let n = read(&img, "/f", &mut out, 0).unwrap();
        assert_eq!(n, 4096);
        assert_eq!(out[0], b'A');
        assert!(out[1..].iter().all(|&b| b == 0));
        let ino = path::resolve(&img, "/f").unwrap();
        assert_eq!(img.inode(ino).size, 1);
        assert_eq!(img.superblock().free_data_block_count, free_before + 2);
    }

    #[test]
    fn write_beyond_a_hole_zero_fills_the_gap() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        create(&mut img, "/f", 0o644).unwrap();
        write(&mut img, "/f", b"X", 4096).unwrap();
        let mut out = [0xFFu8; 4096];
        let n = read(&img, "/f", &mut out, 0).unwrap();
        assert_eq!(n, 4096);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn write_past_capacity_fails_with_no_space() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        create(&mut img, "/f", 0o644).unwrap();
        let free = img.superblock().free_data_block_count;
        let offset = (free + 1) * BLOCK_SIZE as u64;
        assert_eq!(write(&mut img, "/f", b"X", offset).unwrap_err(), FsError::NoSpace);
    }
}
