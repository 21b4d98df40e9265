use clap::Parser;
use mow_lib::prelude::*;
use serde::Serialize;
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Convert a PLY model or ANM animation to JSON.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// The .ply or .anm file to read
    input: PathBuf,
    /// The JSON output path. Defaults to the input path with ".json" appended
    output: Option<PathBuf>,
}

fn read_data_write_json<T: Serialize, F: Fn(&Path) -> Result<T, DecodeError>>(
    input_path: &Path,
    output_path: Option<PathBuf>,
    read_t: F,
) -> Result<(), Box<dyn Error>> {
    // Modify the input if no output is specified to allow dragging a file onto the executable.
    let json_output_path = output_path.unwrap_or_else(|| {
        let mut path = input_path.as_os_str().to_owned();
        path.push(".json");
        PathBuf::from(path)
    });

    let parse_start_time = Instant::now();
    let data = read_t(input_path)?;
    info!("Parse: {:?}", parse_start_time.elapsed());

    write_json(&json_output_path, &data)?;
    info!("Wrote {:?}", json_output_path);
    Ok(())
}

fn write_json<T: Serialize, P: AsRef<Path>>(
    output_path: P,
    object: &T,
) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(object)?;

    let mut output_file = std::fs::File::create(output_path)?;
    output_file.write_all(json.as_bytes())?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let extension = cli
        .input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    let result = match extension.as_deref() {
        Some("ply") => read_data_write_json(&cli.input, cli.output, |p| PlyData::from_file(p)),
        Some("anm") => read_data_write_json(&cli.input, cli.output, |p| AnmData::from_file(p)),
        _ => {
            error!("Unsupported file extension for {:?}", cli.input);
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        error!("Error converting {:?}: {}", cli.input, e);
        std::process::exit(1);
    }
}
