use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::discover::files_with_extension;
use crate::error::TrackLoadError;
use crate::model::Track;
use crate::parser::parse_gpx;

/// All loaded tracks, in load order. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackCollection {
    tracks: Vec<Track>,
}

impl TrackCollection {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Loads one track per GPX file. Files are parsed in parallel, but the
    /// resulting order matches `paths`. Any unreadable or malformed file
    /// fails the whole load.
    pub fn load(paths: &[PathBuf]) -> Result<Self, TrackLoadError> {
        let tracks = paths
            .par_iter()
            .map(|path| load_track(path))
            .collect::<Result<Vec<_>, _>>()?;

        let points: usize = tracks.iter().map(Track::len).sum();
        info!("Loaded {} tracks ({} points)", tracks.len(), points);

        Ok(Self { tracks })
    }

    /// Loads every `*.gpx` file in `dir`, sorted by file name. An empty
    /// directory yields an empty collection.
    pub fn load_dir(dir: &Path) -> Result<Self, TrackLoadError> {
        if !dir.is_dir() {
            return Err(TrackLoadError::DirectoryNotFound(dir.to_path_buf()));
        }
        let paths = files_with_extension(dir, "gpx").map_err(|source| TrackLoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        info!("Found {} GPX files in {:?}", paths.len(), dir);

        Self::load(&paths)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }
}

fn load_track(path: &Path) -> Result<Track, TrackLoadError> {
    let file = File::open(path).map_err(|source| TrackLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let points = parse_gpx(BufReader::new(file), path)?;
    let track = Track::new(name_of(path), points);

    match track.time_range() {
        Some((first, last)) => debug!(
            "Track {}: {} points from {} to {}",
            track.name,
            track.len(),
            first,
            last
        ),
        None => debug!("Track {} has no timed points", track.name),
    }

    Ok(track)
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
