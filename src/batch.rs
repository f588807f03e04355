use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::config::GeotagConfig;
use crate::discover::files_with_extension;
use crate::distribute::{Distributor, JobOutcome};
use crate::pipeline::{report, GeotagPipeline};
use crate::sidecar::{sidecar_path, ExifToolSidecar};
use crate::store::TrackCollection;
use crate::tool::ExifToolSession;

/// Counts for a finished batch. Per-file failures never fail the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub files: usize,
    pub written: usize,
    pub failed: usize,
}

/// What each worker does with a dequeued path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// The path is a sidecar to geotag in place.
    Sidecar,
    /// The path is an image whose sidecar is created first.
    Image,
}

/// Geotags every `*.xmp` sidecar in `xmp_dir` from the GPX files in `gpx_dir`.
pub fn geotag_sidecars(
    config: &GeotagConfig,
    xmp_dir: &Path,
    gpx_dir: &Path,
) -> Result<BatchSummary> {
    let files = list_files(xmp_dir, "xmp")?;
    info!("Found {} sidecar files in {:?}", files.len(), xmp_dir);
    run(config, files, gpx_dir, Mode::Sidecar)
}

/// Creates (or reuses) a sidecar for every `*.<image_ext>` image in
/// `image_dir` and geotags it from the GPX files in `gpx_dir`.
pub fn geotag_images(
    config: &GeotagConfig,
    image_dir: &Path,
    image_ext: &str,
    gpx_dir: &Path,
) -> Result<BatchSummary> {
    if image_ext.trim_start_matches('.').eq_ignore_ascii_case("xmp") {
        bail!("Image extension must not be xmp");
    }
    let files = list_files(image_dir, image_ext)?;
    info!(
        "Found {} image files with extension {:?} in {:?}",
        files.len(),
        image_ext,
        image_dir
    );
    run(config, unique_sidecars(files), gpx_dir, Mode::Image)
}

/// Drops images whose sidecar an earlier image already claims, such as
/// `IMG_1.JPG` after `IMG_1.jpg`. The first in sorted order is kept.
fn unique_sidecars(images: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut claimed = HashSet::new();
    images
        .into_iter()
        .filter(|image| {
            let sidecar = sidecar_path(image);
            if claimed.contains(&sidecar) {
                warn!("Skipping {:?}: sidecar {:?} is shared with another image", image, sidecar);
                return false;
            }
            claimed.insert(sidecar);
            true
        })
        .collect()
}

fn list_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Not a directory: {:?}", dir);
    }
    files_with_extension(dir, ext).with_context(|| format!("Failed to list {:?}", dir))
}

fn run(
    config: &GeotagConfig,
    files: Vec<PathBuf>,
    gpx_dir: &Path,
    mode: Mode,
) -> Result<BatchSummary> {
    let start_time = Instant::now();

    // Tracks must load completely before any worker starts.
    let tracks = TrackCollection::load_dir(gpx_dir)
        .with_context(|| format!("Failed to load GPX tracks from {:?}", gpx_dir))?;

    if files.is_empty() {
        info!("Nothing to geotag");
        return Ok(BatchSummary::default());
    }

    let pipeline = GeotagPipeline::new(&tracks, config.locate_options());
    let written = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let distributor = Distributor {
        workers: config.workers.clamp(1, files.len()),
        queue_capacity: config.queue_capacity,
        poll_interval: config.poll_interval,
    };

    let files_count = files.len();
    distributor.run(
        files,
        |_| {
            let session = ExifToolSession::start(&config.exiftool)?;
            Ok(ExifToolSidecar::new(session))
        },
        |io, item| {
            let result = match mode {
                Mode::Sidecar => pipeline.geotag_sidecar(io, &item.path),
                Mode::Image => pipeline.geotag_image(io, &item.path),
            };
            if let Err(e) = &result {
                if e.is_session_lost() {
                    warn!("exiftool session failed on {}: {}", item.path.display(), e);
                    return JobOutcome::SessionLost;
                }
            }
            let counter = if report(&item.path, &result) {
                &written
            } else {
                &failed
            };
            counter.fetch_add(1, Ordering::Relaxed);
            JobOutcome::Done
        },
    )?;

    let summary = BatchSummary {
        files: files_count,
        written: written.into_inner(),
        failed: failed.into_inner(),
    };
    info!(
        "Geotagged {} of {} files ({} failed) in {:?}",
        summary.written,
        summary.files,
        summary.failed,
        start_time.elapsed()
    );

    Ok(summary)
}
