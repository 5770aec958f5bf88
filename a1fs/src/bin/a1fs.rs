//! FUSE mount binary (spec §2 item 10 / `SPEC_FULL.md` §6.4): wires a
//! memory-mapped image to the engine via `fuser`. Argument parsing,
//! mapping, and flush-on-unmount are explicitly out of scope for the
//! engine crate proper (spec.md §1) but have to live somewhere to make
//! the thing runnable.

use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use memmap2::MmapMut;

use a1fs::adapter::A1fsAdapter;
use a1fs::A1fs;

#[derive(Parser)]
#[command(name = "a1fs", about = "Mount an A1FS image via FUSE")]
struct Args {
    /// Path to the A1FS image file.
    image: String,
    /// Mount point directory.
    mountpoint: String,
    /// Flush the mapping to disk (MS_SYNC-equivalent) on unmount.
    #[arg(short, long)]
    sync: bool,
    /// Raise log verbosity to debug.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let file = match std::fs::OpenOptions::new().read(true).write(true).open(&args.image) {
        Ok(f) => f,
        Err(e) => {
            error!("failed to open image {}: {e}", args.image);
            return ExitCode::FAILURE;
        }
    };
    let mut mmap = match unsafe { MmapMut::map_mut(&file) } {
        Ok(m) => m,
        Err(e) => {
            error!("failed to map image: {e}");
            return ExitCode::FAILURE;
        }
    };

    let fs = match A1fs::open(&mut mmap[..]) {
        Ok(fs) => fs,
        Err(e) => {
            error!("failed to open filesystem: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("mounting {} at {}", args.image, args.mountpoint);
    let sync = args.sync;
    let result = fuser::mount2(A1fsAdapter::new(fs), &args.mountpoint, &[]);

    if sync {
        if let Err(e) = mmap.flush() {
            error!("flush on unmount failed: {e}");
            return ExitCode::FAILURE;
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("mount failed: {e}");
            ExitCode::FAILURE
        }
    }
}
