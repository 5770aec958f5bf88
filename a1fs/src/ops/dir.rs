//! Directory operations (spec §4.4): mkdir, rmdir, create, unlink,
//! rename, readdir, utimens.

use crate::bitmap;
use crate::dir;
use crate::error::{FsError, FsResult};
use crate::extent;
use crate::inode::{self, Kind};
use crate::layout::{Dentry, Image, Inode, Timespec, DENTRIES_PER_BLOCK, S_IFDIR, S_IFREG};
use crate::path;

fn now() -> Timespec {
    let d = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Timespec { sec: d.as_secs() as i64, nsec: d.subsec_nanos() as i64 }
}

pub fn mkdir(img: &mut Image, path: &str, mode: u32) -> FsResult<u32> {
    let (parent, name) = path::resolve_parent(img, path)?;
    let new_ino = bitmap::alloc_inode(img)?;
    let block = bitmap::alloc_block(img)?;
    let extent_slot = extent::alloc_extent(img, block as u32, 1)?;

    dir::init_directory_block(img, block, new_ino, parent);

    let mut extents = [0u32; crate::layout::MAX_INODE_EXTENTS];
    extents[0] = extent_slot;
    let new_inode = Inode {
        mode: mode | S_IFDIR,
        links: 2,
        size: 2 * crate::layout::DENTRY_SIZE as u64,
        mtime: now(),
        extents,
    };
    img.set_inode(new_ino, &new_inode);

    dir::insert_dentry(img, parent, Dentry::with_name(new_ino, name)?)?;
    Ok(new_ino)
}

/// Releases every extent (and the blocks within) belonging to `inode`.
fn free_all_extents(img: &mut Image, inode: &Inode) {
    for &slot1 in inode.extents.iter() {
        if slot1 == 0 {
            continue;
        }
        let e = img.extent(slot1);
        for k in 0..e.count as u64 {
            let phys = e.start as u64 + k;
            img.zero_block(phys);
            bitmap::free_block(img, phys);
        }
        extent::free_extent(img, slot1);
    }
}

pub fn rmdir(img: &mut Image, path: &str) -> FsResult<()> {
    let target = path::resolve(img, path)?;
    let target_inode = img.inode(target);
    if Kind::of(&target_inode) != Kind::Directory {
        return Err(FsError::NotADirectory);
    }

    let n = img.superblock().inode_count;
    let blocks = inode::block_list(img, &target_inode);
    for (i, &block) in blocks.iter().enumerate() {
        for slot in 0..DENTRIES_PER_BLOCK {
            if i == 0 && slot < 2 {
                continue;
            }
            if !img.dentry(block, slot).is_empty(n) {
                return Err(FsError::NotEmpty);
            }
        }
    }

    free_all_extents(img, &target_inode);
    bitmap::free_inode(img, target);
    img.set_inode(target, &zeroed_inode());

    let (parent, name) = path::resolve_parent(img, path)?;
    dir::remove_dentry(img, parent, name);
    Ok(())
}

fn zeroed_inode() -> Inode {
    Inode { mode: 0, links: 0, size: 0, mtime: Timespec { sec: 0, nsec: 0 }, extents: [0u32; crate::layout::MAX_INODE_EXTENTS] }
}

pub fn create(img: &mut Image, path: &str, mode: u32) -> FsResult<u32> {
    let (parent, name) = path::resolve_parent(img, path)?;
    let new_ino = bitmap::alloc_inode(img)?;
    let block = bitmap::alloc_block(img)?;
    let extent_slot = extent::alloc_extent(img, block as u32, 1)?;

    let mut extents = [0u32; crate::layout::MAX_INODE_EXTENTS];
    extents[0] = extent_slot;
    let new_inode = Inode { mode: mode | S_IFREG, links: 2, size: 0, mtime: now(), extents };
    img.set_inode(new_ino, &new_inode);

    dir::insert_dentry(img, parent, Dentry::with_name(new_ino, name)?)?;
    Ok(new_ino)
}

pub fn unlink(img: &mut Image, path: &str) -> FsResult<()> {
    let (parent, name) = path::resolve_parent(img, path)?;
    let target = dir::find_dentry(img, parent, name)?.ok_or(FsError::NoEntry)?;
    let target_inode = img.inode(target);

    free_all_extents(img, &target_inode);
    bitmap::free_inode(img, target);
    img.set_inode(target, &zeroed_inode());
    dir::remove_dentry(img, parent, name);
    Ok(())
}

pub fn rename(img: &mut Image, from: &str, to: &str) -> FsResult<()> {
    let from_ino = path::resolve(img, from)?;
    let (from_parent, from_name) = path::resolve_parent(img, from)?;

    match path::resolve(img, to) {
        Err(FsError::NoEntry) => {
            let (to_parent, to_name) = path::resolve_parent(img, to)?;
            dir::remove_dentry(img, from_parent, from_name);
            dir::insert_dentry(img, to_parent, Dentry::with_name(from_ino, to_name)?)?;
            Ok(())
        }
        Ok(to_ino) => {
            if Kind::of(&img.inode(to_ino)) == Kind::Directory {
                dir::remove_dentry(img, from_parent, from_name);
                dir::insert_dentry(img, to_ino, Dentry::with_name(from_ino, from_name)?)?;
                Ok(())
            } else {
                Err(FsError::NoSpace)
            }
        }
        Err(e) => Err(e),
    }
}

pub fn readdir(img: &Image, path: &str) -> FsResult<Vec<(String, u32)>> {
    let target = path::resolve(img, path)?;
    if Kind::of(&img.inode(target)) != Kind::Directory {
        return Err(FsError::NotADirectory);
    }
    Ok(dir::list_entries(img, target))
}

pub fn utimens(img: &mut Image, path: &str, mtime: Timespec) -> FsResult<()> {
    let target = path::resolve(img, path)?;
    let mut inode = img.inode(target);
    inode.mtime = mtime;
    img.set_inode(target, &inode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_image;
    use crate::layout::ROOT_INO;

    fn fresh(n_inodes: u32, blocks: u64) -> Vec<u8> {
        let mut buf = vec![0u8; (blocks * 4096) as usize];
        format_image(&mut buf, n_inodes).unwrap();
        buf
    }

    #[test]
    fn mkdir_then_readdir_parent_sees_child() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        mkdir(&mut img, "/a", 0o755).unwrap();
        mkdir(&mut img, "/a/b", 0o755).unwrap();
        let entries = readdir(&img, "/a").unwrap();
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec![".", "..", "b"]);
    }

    #[test]
    fn rmdir_nonempty_fails() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        mkdir(&mut img, "/a", 0o755).unwrap();
        create(&mut img, "/a/f", 0o644).unwrap();
        assert_eq!(rmdir(&mut img, "/a").unwrap_err(), FsError::NotEmpty);
        assert!(path::resolve(&img, "/a").is_ok());
    }

    #[test]
    fn delete_recreate_round_trip() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        mkdir(&mut img, "/p", 0o755).unwrap();
        rmdir(&mut img, "/p").unwrap();
        mkdir(&mut img, "/p", 0o755).unwrap();
        let entries = readdir(&img, "/p").unwrap();
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec![".", ".."]);
    }

    #[test]
    fn rename_into_existing_directory_uses_original_name() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        create(&mut img, "/f", 0o644).unwrap();
        mkdir(&mut img, "/d", 0o755).unwrap();
        rename(&mut img, "/f", "/d").unwrap();
        let entries = readdir(&img, "/d").unwrap();
        assert!(entries.iter().any(|(n, _)| n == "f"));
        assert_eq!(path::resolve(&img, "/f").unwrap_err(), FsError::NoEntry);
    }

    #[test]
    fn rename_onto_existing_file_fails_no_space() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        create(&mut img, "/a", 0o644).unwrap();
        create(&mut img, "/b", 0o644).unwrap();
        assert_eq!(rename(&mut img, "/a", "/b").unwrap_err(), FsError::NoSpace);
    }

    #[test]
    fn root_is_its_own_parent() {
        let mut buf = fresh(32, 64);
        let img = Image::new(&mut buf);
        let entries = readdir(&img, "/").unwrap();
        assert_eq!(entries[0], (".".to_string(), ROOT_INO));
        assert_eq!(entries[1], ("..".to_string(), ROOT_INO));
    }

    #[test]
    fn create_sets_link_count_to_two() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        let ino = create(&mut img, "/f", 0o644).unwrap();
        assert_eq!(img.inode(ino).links, 2);
    }

    #[test]
    fn unlink_through_non_directory_parent_is_not_a_directory() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        create(&mut img, "/f", 0o644).unwrap();
        assert_eq!(unlink(&mut img, "/f/x").unwrap_err(), FsError::NotADirectory);
    }

    #[test]
    fn rename_through_non_directory_parent_is_not_a_directory() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        create(&mut img, "/f", 0o644).unwrap();
        assert_eq!(rename(&mut img, "/f/x", "/g").unwrap_err(), FsError::NotADirectory);
    }
}
