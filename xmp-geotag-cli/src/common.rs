use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use rayon::ThreadPoolBuilder;
use tracing_subscriber::EnvFilter;
use xmp_geotag::GeotagConfig;

/// Options shared by both tools.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Number of parallel workers (default: number of CPU cores)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub threads: Option<u64>,

    /// Path to the exiftool executable
    #[arg(long, value_name = "PATH", default_value = "exiftool")]
    pub exiftool: PathBuf,

    /// Do not interpolate between track points further apart than this
    #[arg(long, value_name = "SECONDS")]
    pub max_gap_secs: Option<u64>,
}

impl CommonArgs {
    pub fn config(&self) -> Result<GeotagConfig> {
        let threads = self.threads.map(usize::try_from).transpose()?;

        // GPX files are parsed on the rayon pool.
        if let Some(threads) = threads {
            ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .context("Failed to build thread pool")?;
        }

        let config = GeotagConfig {
            exiftool: self.exiftool.clone(),
            ..GeotagConfig::default()
        };
        Ok(config
            .with_workers(threads)
            .with_max_gap_secs(self.max_gap_secs))
    }
}

/// Logs to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
