use clap::Parser;
use mow_lib::{export::write_obj, formats::ply::PlyData};
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Export the geometry of a PLY model to Wavefront OBJ.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// The .ply file to read
    input: PathBuf,
    /// The OBJ output path. Defaults to the input path with the ".obj" extension
    output: Option<PathBuf>,
}

fn export_obj(input: &Path, output: &Path) -> Result<(), Box<dyn Error>> {
    let start = Instant::now();
    let data = PlyData::from_file(input)?;
    info!(
        "Read {} vertices and {} triangles in {:?}",
        data.vertices.len(),
        data.triangles.len(),
        start.elapsed()
    );

    let mut writer = BufWriter::new(File::create(output)?);
    write_obj(&data, &mut writer)?;
    writer.flush()?;
    info!("Wrote {:?}", output);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("obj"));

    if let Err(e) = export_obj(&cli.input, &output) {
        error!("Error exporting {:?}: {}", cli.input, e);
        std::process::exit(1);
    }
}
