use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

mod common;

use common::{init_logging, CommonArgs};

/// Create geotagged XMP sidecars for image files from GPX track logs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory with image files
    #[arg(value_name = "IMAGE_DIR")]
    image_dir: PathBuf,

    /// File extension for image files (e.g. NEF, jpg)
    #[arg(value_name = "IMAGE_FILE_EXT")]
    image_file_ext: String,

    /// Directory with GPX files
    #[arg(value_name = "GPX_DIR")]
    gpx_dir: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();
    let config = args.common.config()?;

    info!(
        "Geotagging image files with extension \".{}\" in {:?}",
        args.image_file_ext.trim_start_matches('.'),
        args.image_dir
    );
    let summary = xmp_geotag::geotag_images(
        &config,
        &args.image_dir,
        &args.image_file_ext,
        &args.gpx_dir,
    )?;

    if summary.failed > 0 {
        info!("{} files could not be geotagged, see log above", summary.failed);
    }

    Ok(())
}
