use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// Meters to feet, applied only when presenting a location.
pub const FEET_PER_METER: f64 = 3.28084;

/// A single timestamped GPS sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level, when the log recorded it.
    pub elevation: Option<f64>,
}

impl TrackPoint {
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            elevation: Some(elevation),
        }
    }

    pub fn location(&self) -> Location {
        Location {
            latitude: self.latitude,
            longitude: self.longitude,
            elevation_meters: self.elevation,
        }
    }
}

/// Samples of one GPS log file, sorted ascending by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub name: String,
    points: Vec<TrackPoint>,
}

impl Track {
    /// Builds a track, sorting the points by time. The sort is stable so
    /// samples sharing a timestamp keep their file order.
    pub fn new(name: impl Into<String>, mut points: Vec<TrackPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self {
            name: name.into(),
            points,
        }
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// First and last sample time, if the track has any samples.
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        }
    }

    /// Whether `at` lies within the recorded time range.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.time_range()
            .is_some_and(|(first, last)| first <= at && at <= last)
    }
}

/// A resolved position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_meters: Option<f64>,
}

impl Location {
    pub fn elevation_feet(&self) -> Option<f64> {
        self.elevation_meters.map(|m| m * FEET_PER_METER)
    }
}

/// Why a location could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    NoCoverage,
    MissingTimestamp,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::NoCoverage => f.write_str("no track coverage"),
            UnresolvedReason::MissingTimestamp => f.write_str("no capture timestamp"),
        }
    }
}

/// Outcome of a location lookup. Either fully populated or unresolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationResult {
    Resolved(Location),
    Unresolved(UnresolvedReason),
}

impl LocationResult {
    pub fn location(&self) -> Option<&Location> {
        match self {
            LocationResult::Resolved(location) => Some(location),
            LocationResult::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, LocationResult::Resolved(_))
    }
}

/// A sidecar whose capture time has been read, waiting for a location.
#[derive(Debug, Clone, PartialEq)]
pub struct GeotagRequest {
    pub file_path: PathBuf,
    pub capture_timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_track_sorts_points() {
        let track = Track::new(
            "unordered",
            vec![
                TrackPoint::new(at(20), 2.0, 2.0, 2.0),
                TrackPoint::new(at(0), 0.0, 0.0, 0.0),
                TrackPoint::new(at(10), 1.0, 1.0, 1.0),
            ],
        );

        let times: Vec<_> = track.points().iter().map(|p| p.timestamp).collect();
        assert_eq!(times, vec![at(0), at(10), at(20)]);
        assert_eq!(track.time_range(), Some((at(0), at(20))));
    }

    #[test]
    fn test_track_coverage_is_inclusive() {
        let track = Track::new(
            "a",
            vec![
                TrackPoint::new(at(0), 0.0, 0.0, 0.0),
                TrackPoint::new(at(10), 1.0, 1.0, 1.0),
            ],
        );

        assert!(track.covers(at(0)));
        assert!(track.covers(at(10)));
        assert!(!track.covers(at(-1)));
        assert!(!track.covers(at(11)));
        assert!(!Track::new("empty", vec![]).covers(at(0)));
    }

    #[test]
    fn test_elevation_feet() {
        let location = Location {
            latitude: 0.0,
            longitude: 0.0,
            elevation_meters: Some(100.0),
        };
        assert_eq!(location.elevation_feet(), Some(328.084));

        let no_elevation = Location {
            elevation_meters: None,
            ..location
        };
        assert_eq!(no_elevation.elevation_feet(), None);
    }
}
