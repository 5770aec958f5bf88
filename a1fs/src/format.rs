//! Formatter (spec §4.6): initializes a fresh image so the engine can
//! mount it. Shared by the `mkfs.a1fs` CLI and by every engine test.

use log::debug;

use crate::error::{FsError, FsResult};
use crate::layout::{
    inode_blocks_for, Dentry, Extent, Image, Inode, Timespec, BLOCK_SIZE, INODE_TABLE_START_BLOCK,
    MAGIC, MAX_INODE_EXTENTS, ROOT_INO, S_IFDIR,
};

/// Initializes `image` (already sized and zero-length-checked by the
/// caller) as a fresh A1FS filesystem with `n_inodes` inodes.
pub fn format_image(image: &mut [u8], n_inodes: u32) -> FsResult<()> {
    if image.len() % BLOCK_SIZE != 0 {
        return Err(FsError::CorruptImage);
    }
    if n_inodes == 0 {
        return Err(FsError::CorruptImage);
    }
    let total_blocks = (image.len() / BLOCK_SIZE) as u64;
    let inode_blocks = inode_blocks_for(n_inodes);
    if (inode_blocks as u64 + 5) > total_blocks {
        return Err(FsError::NoSpace);
    }
    let data_block_count = total_blocks - 4 - inode_blocks as u64;
    let image_len = image.len() as u64;

    let mut img = Image::new(image);

    // Both bitmaps get bits 0 *and* 1 set, wasting one inode and one
    // data block per image — preserved from the reference formatter
    // rather than silently corrected. See `DESIGN.md` / `SPEC_FULL.md` §9.
    img.zero_block(crate::layout::INODE_BITMAP_BLOCK);
    img.inode_bitmap_mut()[0] = 0b11;
    img.zero_block(crate::layout::BLOCK_BITMAP_BLOCK);
    img.block_bitmap_mut()[0] = 0b11;

    img.zero_block(crate::layout::EXTENT_TABLE_BLOCK);
    let root_block = INODE_TABLE_START_BLOCK + inode_blocks as u64;
    img.set_extent(1, Extent { start: root_block as u32, count: 1 });

    let sb = crate::layout::SuperBlock {
        magic: MAGIC,
        size: image_len,
        inode_count: n_inodes,
        inode_blocks,
        free_inode_count: n_inodes - 1,
        data_block_count,
        free_data_block_count: data_block_count - 1,
        reserved_extent_count: 1,
    };
    img.set_superblock(&sb);

    let mut extents = [0u32; MAX_INODE_EXTENTS];
    extents[0] = 1;
    let root_inode = Inode {
        mode: S_IFDIR | 0o755,
        links: 2,
        size: 2 * crate::layout::DENTRY_SIZE as u64,
        mtime: now(),
        extents,
    };
    img.set_inode(ROOT_INO, &root_inode);

    img.zero_block(root_block);
    img.set_dentry(root_block, 0, &Dentry::with_name(ROOT_INO, ".").unwrap());
    img.set_dentry(root_block, 1, &Dentry::with_name(ROOT_INO, "..").unwrap());
    for slot in 2..crate::layout::DENTRIES_PER_BLOCK {
        img.set_dentry(root_block, slot, &Dentry::empty(n_inodes));
    }

    debug!(
        "formatted image: {} blocks, {} inodes ({} inode blocks), {} data blocks",
        total_blocks, n_inodes, inode_blocks, data_block_count
    );
    Ok(())
}

fn now() -> Timespec {
    let d = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Timespec { sec: d.as_secs() as i64, nsec: d.subsec_nanos() as i64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir;
    use crate::layout::ROOT_INO;

    #[test]
    fn scenario_1_format_1mib_with_32_inodes() {
        let mut buf = vec![0u8; 1024 * 1024];
        format_image(&mut buf, 32).unwrap();
        let img = Image::new(&mut buf);
        let sb = img.superblock();
        assert_eq!(sb.magic, MAGIC);
        assert_eq!(sb.free_inode_count, 31);
        let total_blocks = sb.size / BLOCK_SIZE as u64;
        assert_eq!(sb.free_data_block_count, total_blocks - 5 - 1);
        let entries = dir::list_entries(&img, ROOT_INO);
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec![".", ".."]);
    }

    #[test]
    fn rejects_non_multiple_of_block_size() {
        let mut buf = vec![0u8; 4097];
        assert_eq!(format_image(&mut buf, 32).unwrap_err(), FsError::CorruptImage);
    }

    #[test]
    fn idempotent_format_yields_equal_images_ignoring_mtime() {
        let mut a = vec![0u8; 64 * 4096];
        let mut b = vec![0u8; 64 * 4096];
        format_image(&mut a, 32).unwrap();
        format_image(&mut b, 32).unwrap();
        // mtime is the only field allowed to differ between formats.
        let mtime_range = {
            let off = INODE_TABLE_START_BLOCK as usize * BLOCK_SIZE;
            off + 16..off + 32
        };
        for i in 0..a.len() {
            if mtime_range.contains(&i) {
                continue;
            }
            assert_eq!(a[i], b[i], "byte {i} differs");
        }
    }
}
