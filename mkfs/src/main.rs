//! Formatter CLI (spec §6.3): `mkfs.a1fs`.

use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use memmap2::MmapMut;

use a1fs::format::format_image;
use a1fs::layout::MAGIC;

#[derive(Parser)]
#[command(name = "mkfs.a1fs", about = "Initialize an A1FS image")]
struct Args {
    /// Number of inodes to provision.
    #[arg(short = 'i', long = "inodes")]
    n_inodes: u32,

    /// Force reformatting an image that already carries the A1FS magic.
    #[arg(short = 'f', long)]
    force: bool,

    /// Flush the mapping to disk after formatting.
    #[arg(short = 's', long)]
    sync: bool,

    /// Raise log verbosity to debug.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Zero the image before formatting.
    #[arg(short = 'z', long)]
    zero: bool,

    /// Path to the image file to format.
    image: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if args.n_inodes == 0 {
        error!("-i must be a positive inode count");
        return ExitCode::FAILURE;
    }

    let file = match std::fs::OpenOptions::new().read(true).write(true).open(&args.image) {
        Ok(f) => f,
        Err(e) => {
            error!("failed to open {}: {e}", args.image);
            return ExitCode::FAILURE;
        }
    };
    let mut mmap = match unsafe { MmapMut::map_mut(&file) } {
        Ok(m) => m,
        Err(e) => {
            error!("failed to map {}: {e}", args.image);
            return ExitCode::FAILURE;
        }
    };

    if !args.force && mmap.len() >= 8 {
        let existing_magic = u64::from_le_bytes(mmap[0..8].try_into().unwrap());
        if existing_magic == MAGIC {
            error!("{} already formatted as A1FS; pass -f to force", args.image);
            return ExitCode::FAILURE;
        }
    }

    if args.zero {
        mmap.fill(0);
    }

    if let Err(e) = format_image(&mut mmap[..], args.n_inodes) {
        error!("format failed: {e}");
        return ExitCode::FAILURE;
    }

    if args.sync {
        if let Err(e) = mmap.flush() {
            error!("sync failed: {e}");
            return ExitCode::FAILURE;
        }
    }

    info!("formatted {} with {} inodes", args.image, args.n_inodes);
    ExitCode::SUCCESS
}
