//! Inode kind dispatch and the logical block map (§4.5.1).

use crate::layout::{Image, Inode, MAX_INODE_EXTENTS};

/// Tagged variant derived from the mode bits, replacing the teacher's
/// polymorphism-by-enum-field-comparison with a single dispatch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Directory,
    File,
}

impl Kind {
    pub fn of(inode: &Inode) -> Self {
        if inode.is_dir() {
            Kind::Directory
        } else {
            Kind::File
        }
    }
}

/// First unused (zero) slot in the inode's extent array, if any.
pub fn first_free_extent_slot(inode: &Inode) -> Option<usize> {
    inode.extents.iter().position(|&e| e == 0)
}

/// Highest-indexed slot currently holding a non-zero extent reference.
pub fn last_used_extent_slot(inode: &Inode) -> Option<usize> {
    (0..MAX_INODE_EXTENTS).rev().find(|&i| inode.extents[i] != 0)
}

/// Concatenates the physical blocks of an inode's extents in extent-slot
/// order (0..24, skipping unused slots). Logical block `k` of the file
/// is the `k`-th element of the returned list. Recomputed on demand, per
/// the spec; never materialized in the inode itself.
pub fn block_list(img: &Image, inode: &Inode) -> Vec<u64> {
    let mut blocks = Vec::with_capacity(inode.size as usize / crate::layout::BLOCK_SIZE + 1);
    for &slot1 in inode.extents.iter() {
        if slot1 == 0 {
            continue;
        }
        let extent = img.extent(slot1);
        for k in 0..extent.count as u64 {
            blocks.push(extent.start as u64 + k);
        }
    }
    blocks
}

/// Total block capacity reserved across an inode's extents.
pub fn capacity_blocks(img: &Image, inode: &Inode) -> u64 {
    inode
        .extents
        .iter()
        .filter(|&&slot1| slot1 != 0)
        .map(|&slot1| img.extent(slot1).count as u64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_image;
    use crate::layout::ROOT_INO;
    use crate::ops;

    fn fresh(n_inodes: u32, blocks: u64) -> Vec<u8> {
        let mut buf = vec![0u8; (blocks * 4096) as usize];
        format_image(&mut buf, n_inodes).unwrap();
        buf
    }

    #[test]
    fn root_is_a_directory() {
        let mut buf = fresh(32, 64);
        let img = Image::new(&mut buf);
        assert_eq!(Kind::of(&img.inode(ROOT_INO)), Kind::Directory);
    }

    #[test]
    fn fresh_file_is_not_a_directory() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        let ino = ops::create(&mut img, "/f", 0o644).unwrap();
        assert_eq!(Kind::of(&img.inode(ino)), Kind::File);
    }

    #[test]
    fn block_list_concatenates_extents_in_slot_order() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        let ino = ops::create(&mut img, "/f", 0o644).unwrap();
        ops::truncate(&mut img, "/f", 3 * 4096).unwrap();
        let inode = img.inode(ino);
        let blocks = block_list(&img, &inode);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks.iter().collect::<std::collections::HashSet<_>>().len(), 3);
    }
}
