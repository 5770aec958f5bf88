//! Extent Table Manager (spec §4.3): the 512-slot table shared across
//! every inode in the image.

use crate::error::{FsError, FsResult};
use crate::layout::{Extent, Image, EXTENT_TABLE_ENTRIES};

/// Scans 1-based slots 2..=512 (slot 1 holds the root's first extent at
/// format time and is excluded from search, matching the reference
/// formatter's reservation) and returns the first free slot's 1-based
/// index.
pub fn alloc_extent(img: &mut Image, start: u32, count: u32) -> FsResult<u32> {
    for zero_based in 1..EXTENT_TABLE_ENTRIES {
        let slot1 = (zero_based + 1) as u32;
        if img.extent(slot1).is_empty() {
            img.set_extent(slot1, Extent { start, count });
            let mut sb = img.superblock();
            sb.reserved_extent_count += 1;
            img.set_superblock(&sb);
            return Ok(slot1);
        }
    }
    Err(FsError::NoSpace)
}

pub fn free_extent(img: &mut Image, slot1: u32) {
    debug_assert!(!img.extent(slot1).is_empty(), "freeing an already-free extent slot");
    img.set_extent(slot1, Extent::default());
    let mut sb = img.superblock();
    sb.reserved_extent_count -= 1;
    img.set_superblock(&sb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_image;

    fn fresh(n_inodes: u32, blocks: u64) -> Vec<u8> {
        let mut buf = vec![0u8; (blocks * 4096) as usize];
        format_image(&mut buf, n_inodes).unwrap();
        buf
    }

    #[test]
    fn root_extent_is_slot_one_and_excluded_from_search() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        assert!(!img.extent(1).is_empty());
        let slot = alloc_extent(&mut img, 99, 1).unwrap();
        assert_eq!(slot, 2);
    }

    #[test]
    fn free_then_realloc_returns_same_slot() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        let slot = alloc_extent(&mut img, 10, 1).unwrap();
        free_extent(&mut img, slot);
        let reused = alloc_extent(&mut img, 20, 2).unwrap();
        assert_eq!(reused, slot);
        assert_eq!(img.extent(reused), Extent { start: 20, count: 2 });
    }
}
