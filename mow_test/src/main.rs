use clap::Parser;
use mow_lib::prelude::*;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Test decoding for all PLY and ANM files recursively in a game folder.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// The root folder of the game resources
    root_folder: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let folder = Path::new(&cli.root_folder);
    let start = std::time::Instant::now();

    let checked = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let walker = match globwalk::GlobWalkerBuilder::from_patterns(folder, &["*.{ply,anm}"])
        .case_insensitive(true)
        .build()
    {
        Ok(walker) => walker,
        Err(e) => {
            error!("Error searching {:?}: {}", folder, e);
            std::process::exit(1);
        }
    };

    walker
        .filter_map(|p| p.ok())
        .par_bridge()
        .for_each(|entry| {
            checked.fetch_add(1, Ordering::Relaxed);
            if !check_read(entry.path()) {
                failed.fetch_add(1, Ordering::Relaxed);
            }
        });

    info!(
        "Checked {} files with {} failures in {:?}",
        checked.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed()
    );
}

fn check_read(path: &Path) -> bool {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Error reading {:?}: {}", path, e);
            return false;
        }
    };

    let is_animation = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("anm"))
        .unwrap_or(false);

    let result = if is_animation {
        decode_animation(&bytes).map(|_| ())
    } else {
        decode_geometry(&bytes).map(|_| ())
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Error decoding {:?}: {}", path, e);
            false
        }
    }
}
