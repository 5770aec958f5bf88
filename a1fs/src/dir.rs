//! Directory content primitives shared by the path resolver and the
//! directory operations: dentry lookup, iteration, and the "insert
//! dentry into parent" primitive common to mkdir/create/rename (spec
//! §4.4).

use crate::error::{FsError, FsResult};
use crate::extent;
use crate::inode;
use crate::layout::{Dentry, Image, DENTRIES_PER_BLOCK};

/// Every physical (block, slot) pair backing a directory's dentry array,
/// in logical order.
fn slots(img: &Image, dir_ino: u32) -> Vec<(u64, usize)> {
    let inode = img.inode(dir_ino);
    let mut out = Vec::new();
    for block in inode::block_list(img, &inode) {
        for slot in 0..DENTRIES_PER_BLOCK {
            out.push((block, slot));
        }
    }
    out
}

/// Looks up `name` within `dir_ino`'s dentries. `Ok(None)` if absent.
pub fn find_dentry(img: &Image, dir_ino: u32, name: &str) -> FsResult<Option<u32>> {
    let n = img.superblock().inode_count;
    for (block, slot) in slots(img, dir_ino) {
        let d = img.dentry(block, slot);
        if !d.is_empty(n) && d.name_str() == name {
            return Ok(Some(d.inode));
        }
    }
    Ok(None)
}

/// All non-empty (name, inode) entries of a directory, in logical order.
pub fn list_entries(img: &Image, dir_ino: u32) -> Vec<(String, u32)> {
    let n = img.superblock().inode_count;
    slots(img, dir_ino)
        .into_iter()
        .map(|(block, slot)| img.dentry(block, slot))
        .filter(|d| !d.is_empty(n))
        .map(|d| (d.name_str().to_string(), d.inode))
        .collect()
}

/// Writes `.` and `..` into the first two slots of a freshly allocated
/// directory block, with the remaining slots left as sentinel-empty.
/// Both entries point at `owner` — this is the behavior preserved from
/// the reference `make_new_dir_block`, applied uniformly whether `owner`
/// is the directory's own inode (first block, at mkdir/format time) or
/// is passed in again for a secondary block grown later by
/// `insert_dentry` (see `DESIGN.md`).
pub fn init_directory_block(img: &mut Image, block: u64, dot: u32, dotdot: u32) {
    let n = img.superblock().inode_count;
    img.set_dentry(block, 0, &Dentry::with_name(dot, ".").unwrap());
    img.set_dentry(block, 1, &Dentry::with_name(dotdot, "..").unwrap());
    for slot in 2..DENTRIES_PER_BLOCK {
        img.set_dentry(block, slot, &Dentry::empty(n));
    }
}

/// Inserts `dentry` into `dir_ino`, growing the directory by one block
/// if every existing slot is occupied.
pub fn insert_dentry(img: &mut Image, dir_ino: u32, dentry: Dentry) -> FsResult<()> {
    let n = img.superblock().inode_count;
    for (block, slot) in slots(img, dir_ino) {
        if img.dentry(block, slot).is_empty(n) {
            img.set_dentry(block, slot, &dentry);
            let mut updated = img.inode(dir_ino);
            updated.size += crate::layout::DENTRY_SIZE as u64;
            img.set_inode(dir_ino, &updated);
            return Ok(());
        }
    }

    let dir_inode = img.inode(dir_ino);
    let free_slot = inode::first_free_extent_slot(&dir_inode).ok_or(FsError::NoSpace)?;
    let new_block = crate::bitmap::alloc_block(img)?;
    let extent_slot = extent::alloc_extent(img, new_block as u32, 1)?;
    init_directory_block(img, new_block, dir_ino, dir_ino);
    img.set_dentry(new_block, 2, &dentry);

    let mut updated = img.inode(dir_ino);
    updated.extents[free_slot] = extent_slot;
    updated.size += crate::layout::DENTRY_SIZE as u64;
    img.set_inode(dir_ino, &updated);
    Ok(())
}

/// Clears the dentry matching `name` inside `dir_ino`, if present.
pub fn remove_dentry(img: &mut Image, dir_ino: u32, name: &str) {
    let n = img.superblock().inode_count;
    for (block, slot) in slots(img, dir_ino) {
        let d = img.dentry(block, slot);
        if !d.is_empty(n) && d.name_str() == name {
            img.set_dentry(block, slot, &Dentry::empty(n));
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_image;
    use crate::layout::ROOT_INO;

    #[test]
    fn root_starts_with_dot_and_dotdot() {
        let mut buf = vec![0u8; 64 * 4096];
        format_image(&mut buf, 32).unwrap();
        let img = Image::new(&mut buf);
        let entries = list_entries(&img, ROOT_INO);
        assert_eq!(entries, vec![(".".to_string(), 0), ("..".to_string(), 0)]);
    }

    #[test]
    fn insert_grows_a_new_block_once_full() {
        let mut buf = vec![0u8; 128 * 4096];
        format_image(&mut buf, 64).unwrap();
        let mut img = Image::new(&mut buf);
        // Root's first block already holds . and .. (2 slots); fill the
        // remaining 14 to force growth on the 15th insert.
        for i in 0..14 {
            let name = format!("f{i}");
            insert_dentry(&mut img, ROOT_INO, Dentry::with_name(10 + i as u32, &name).unwrap())
                .unwrap();
        }
        insert_dentry(&mut img, ROOT_INO, Dentry::with_name(99, "overflow").unwrap()).unwrap();
        let entries = list_entries(&img, ROOT_INO);
        assert!(entries.iter().any(|(n, i)| n == "overflow" && *i == 99));
        let dir_inode = img.inode(ROOT_INO);
        assert!(inode::first_free_extent_slot(&dir_inode).unwrap() > 1);
    }
}
