use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

mod common;

use common::{init_logging, CommonArgs};

/// Update the location fields of XMP sidecar files from GPX track logs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory with XMP sidecar files
    #[arg(value_name = "XMP_DIR")]
    xmp_dir: PathBuf,

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

    info!("Geotagging XMP sidecars in {:?}", args.xmp_dir);
    let summary = xmp_geotag::geotag_sidecars(&config, &args.xmp_dir, &args.gpx_dir)?;

    if summary.failed > 0 {
        info!("{} files could not be geotagged, see log above", summary.failed);
    }

    Ok(())
}
