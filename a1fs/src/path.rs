//! Path Resolver (spec §4.1): walks `/`-separated components from the
//! root inode through directory entries.

use crate::dir;
use crate::error::{FsError, FsResult};
use crate::inode::Kind;
use crate::layout::{Image, ROOT_INO};

/// Splits a path into its non-empty components, discarding the leading
/// slash and any trailing slash.
fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Resolves an absolute path to its inode number.
pub fn resolve(img: &Image, path: &str) -> FsResult<u32> {
    let mut current = ROOT_INO;
    let mut comps = components(path).peekable();
    while let Some(name) = comps.next() {
        let inode = img.inode(current);
        if Kind::of(&inode) != Kind::Directory {
            return Err(FsError::NotADirectory);
        }
        current = dir::find_dentry(img, current, name)?.ok_or(FsError::NoEntry)?;
        let _ = comps.peek();
    }
    Ok(current)
}

/// Resolves everything but the final path component, returning the
/// parent's inode number and the unresolved final component name.
///
/// Root (`/`) has no parent to resolve to under this scheme and is
/// rejected with `NoEntry` by callers that require a final component
/// (mkdir/create/rename/unlink never target `/` itself).
pub fn resolve_parent<'a>(img: &Image, path: &'a str) -> FsResult<(u32, &'a str)> {
    let mut comps: Vec<&str> = components(path).collect();
    let name = comps.pop().ok_or(FsError::NoEntry)?;
    let mut current = ROOT_INO;
    for component in comps {
        let inode = img.inode(current);
        if Kind::of(&inode) != Kind::Directory {
            return Err(FsError::NotADirectory);
        }
        current = dir::find_dentry(img, current, component)?.ok_or(FsError::NoEntry)?;
    }
    if Kind::of(&img.inode(current)) != Kind::Directory {
        return Err(FsError::NotADirectory);
    }
    Ok((current, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_image;
    use crate::ops;

    fn fresh(n_inodes: u32, blocks: u64) -> Vec<u8> {
        let mut buf = vec![0u8; (blocks * 4096) as usize];
        format_image(&mut buf, n_inodes).unwrap();
        buf
    }

    #[test]
    fn resolves_root() {
        let mut buf = fresh(32, 64);
        let img = Image::new(&mut buf);
        assert_eq!(resolve(&img, "/").unwrap(), ROOT_INO);
    }

    #[test]
    fn resolves_nested_directory() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        ops::mkdir(&mut img, "/a", 0o755).unwrap();
        ops::mkdir(&mut img, "/a/b", 0o755).unwrap();
        let img = Image::new(&mut buf);
        let ino = resolve(&img, "/a/b").unwrap();
        assert!(Kind::of(&img.inode(ino)) == Kind::Directory);
    }

    #[test]
    fn missing_component_is_no_entry() {
        let mut buf = fresh(32, 64);
        let img = Image::new(&mut buf);
        assert_eq!(resolve(&img, "/nope").unwrap_err(), FsError::NoEntry);
    }

    #[test]
    fn non_terminal_file_component_is_not_a_directory() {
        let mut buf = fresh(32, 64);
        let mut img = Image::new(&mut buf);
        ops::create(&mut img, "/f", 0o644).unwrap();
        let img = Image::new(&mut buf);
        assert_eq!(resolve(&img, "/f/x").unwrap_err(), FsError::NotADirectory);
    }
}
