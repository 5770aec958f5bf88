//! Operation-specific subsystems invoked by the top-level engine
//! (`fs.rs`) after path resolution: directory mutations and the file
//! data engine.

pub mod dir;
pub mod file;

pub use dir::{create, mkdir, readdir, rename, rmdir, unlink, utimens};
pub use file::{read, truncate, write};
