//! Error taxonomy shared by every engine operation.
//!
//! Variants map 1:1 onto the POSIX errno family the adapter reports back
//! to the kernel bridge; the mapping itself lives in `adapter.rs` so this
//! module stays free of any FUSE/libc dependency.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("no such file or directory")]
    NoEntry,
    #[error("not a directory")]
    NotADirectory,
    #[error("file name too long")]
    NameTooLong,
    #[error("directory not empty")]
    NotEmpty,
    #[error("no space left on device")]
    NoSpace,
    #[error("out of memory")]
    OutOfMemory,
    #[error("corrupt filesystem image")]
    CorruptImage,
}

pub type FsResult<T> = Result<T, FsError>;
