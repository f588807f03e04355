use std::fmt;
use std::path::Path;

use tracing::{error, info, warn};

use crate::error::{GeotagError, SidecarError};
use crate::locate::{locate_with, LocateOptions};
use crate::model::{GeotagRequest, Location, LocationResult};
use crate::sidecar::SidecarIo;
use crate::store::TrackCollection;

/// Where a file is in the geotag state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// An image whose sidecar has not been produced yet.
    Image,
    Discovered,
    TimestampExtracted,
    LocationResolved,
    Written,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Image => "image",
            Stage::Discovered => "discovered",
            Stage::TimestampExtracted => "timestamp extracted",
            Stage::LocationResolved => "location resolved",
            Stage::Written => "written",
        };
        f.write_str(name)
    }
}

/// Per-worker geotag step. Borrows the shared tracks and owns nothing else.
pub struct GeotagPipeline<'a> {
    tracks: &'a TrackCollection,
    options: LocateOptions,
}

impl<'a> GeotagPipeline<'a> {
    pub fn new(tracks: &'a TrackCollection, options: LocateOptions) -> Self {
        Self { tracks, options }
    }

    /// Runs one sidecar through extract, resolve and write.
    pub fn geotag_sidecar<S: SidecarIo>(
        &self,
        io: &mut S,
        sidecar: &Path,
    ) -> Result<Location, GeotagError> {
        let capture_timestamp = io
            .read_capture_timestamp(sidecar)
            .map_err(failed_at(Stage::Discovered, GeotagError::MissingTimestamp))?;
        let request = GeotagRequest {
            file_path: sidecar.to_path_buf(),
            capture_timestamp,
        };

        let location = match self.resolve(&request) {
            LocationResult::Resolved(location) => location,
            LocationResult::Unresolved(_) => {
                return Err(GeotagError::NoCoverage(request.capture_timestamp))
            }
        };

        io.write_location(&request.file_path, &location)
            .map_err(failed_at(Stage::LocationResolved, GeotagError::Write))?;
        Ok(location)
    }

    /// Produces the sidecar for `image`, then geotags it.
    pub fn geotag_image<S: SidecarIo>(
        &self,
        io: &mut S,
        image: &Path,
    ) -> Result<Location, GeotagError> {
        let sidecar = io
            .create_sidecar(image)
            .map_err(failed_at(Stage::Image, GeotagError::Create))?;
        self.geotag_sidecar(io, &sidecar)
    }

    fn resolve(&self, request: &GeotagRequest) -> LocationResult {
        locate_with(request.capture_timestamp, self.tracks, &self.options)
    }
}

/// Tool failures are kept apart from per-file failures so the caller can
/// tell a broken session from a broken file.
fn failed_at(
    stage: Stage,
    wrap: fn(SidecarError) -> GeotagError,
) -> impl FnOnce(SidecarError) -> GeotagError {
    move |err| match err {
        SidecarError::Tool(source) => GeotagError::Tool { stage, source },
        other => wrap(other),
    }
}

/// Logs the outcome of one file. Returns whether it was written.
pub fn report(path: &Path, result: &Result<Location, GeotagError>) -> bool {
    match result {
        Ok(location) => {
            match (location.elevation_meters, location.elevation_feet()) {
                (Some(meters), Some(feet)) => info!(
                    "Geotagged {}: lat {:.7}, lon {:.7}, ele {:.1} m ({:.1} ft)",
                    path.display(),
                    location.latitude,
                    location.longitude,
                    meters,
                    feet
                ),
                _ => info!(
                    "Geotagged {}: lat {:.7}, lon {:.7}",
                    path.display(),
                    location.latitude,
                    location.longitude
                ),
            }
            true
        }
        Err(e) => {
            match e.unresolved_reason() {
                Some(reason) => warn!("Skipped {} ({}): {}", path.display(), reason, e),
                None => error!("Failed {} at stage {}: {}", path.display(), e.stage(), e),
            }
            false
        }
    }
}
