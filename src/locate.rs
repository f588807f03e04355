use chrono::{DateTime, TimeDelta, Utc};

use crate::model::{Location, LocationResult, Track, TrackPoint, UnresolvedReason};
use crate::store::TrackCollection;

/// Tuning for the lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocateOptions {
    /// Refuse to interpolate between samples further apart than this.
    /// Exact sample matches are unaffected.
    pub max_gap: Option<TimeDelta>,
}

/// Resolves `at` against the tracks with default options.
pub fn locate(at: DateTime<Utc>, tracks: &TrackCollection) -> LocationResult {
    locate_with(at, tracks, &LocateOptions::default())
}

/// Resolves `at` against the tracks. The first track in load order that
/// covers `at` wins; later tracks are not consulted.
pub fn locate_with(
    at: DateTime<Utc>,
    tracks: &TrackCollection,
    options: &LocateOptions,
) -> LocationResult {
    tracks
        .tracks()
        .iter()
        .find_map(|track| position_in_track(track, at, options))
        .map_or(
            LocationResult::Unresolved(UnresolvedReason::NoCoverage),
            LocationResult::Resolved,
        )
}

/// Position within a single track, or `None` when `at` falls outside it.
pub fn position_in_track(
    track: &Track,
    at: DateTime<Utc>,
    options: &LocateOptions,
) -> Option<Location> {
    if !track.covers(at) {
        return None;
    }
    let points = track.points();
    let idx = points.partition_point(|p| p.timestamp < at);
    let after = points.get(idx)?;

    if after.timestamp == at {
        return Some(after.location());
    }
    let before = points.get(idx.checked_sub(1)?)?;

    let span = after.timestamp - before.timestamp;
    if options.max_gap.is_some_and(|gap| span > gap) {
        return None;
    }

    Some(interpolate(before, after, at))
}

fn interpolate(before: &TrackPoint, after: &TrackPoint, at: DateTime<Utc>) -> Location {
    let fraction = seconds(at - before.timestamp) / seconds(after.timestamp - before.timestamp);
    let lerp = |a: f64, b: f64| a + fraction * (b - a);

    Location {
        latitude: lerp(before.latitude, after.latitude),
        longitude: lerp(before.longitude, after.longitude),
        elevation_meters: match (before.elevation, after.elevation) {
            (Some(a), Some(b)) => Some(lerp(a, b)),
            _ => None,
        },
    }
}

fn seconds(delta: TimeDelta) -> f64 {
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    fn track(name: &str, points: &[(i64, f64, f64, f64)]) -> Track {
        Track::new(
            name,
            points
                .iter()
                .map(|&(s, lat, lon, ele)| TrackPoint::new(t(s), lat, lon, ele))
                .collect(),
        )
    }

    fn resolved(result: LocationResult) -> Location {
        *result.location().expect("expected a resolved location")
    }

    #[test]
    fn test_midpoint_interpolation() {
        let tracks = TrackCollection::new(vec![track(
            "a",
            &[(0, 0.0, 0.0, 0.0), (10, 1.0, 1.0, 10.0)],
        )]);

        let location = resolved(locate(t(5), &tracks));
        assert_eq!(location.latitude, 0.5);
        assert_eq!(location.longitude, 0.5);
        assert_eq!(location.elevation_meters, Some(5.0));
    }

    #[test]
    fn test_exact_sample_is_returned_unchanged() {
        let tracks = TrackCollection::new(vec![track(
            "a",
            &[
                (0, 35.123456789, 139.987654321, 12.345),
                (10, 36.0, 140.0, 20.0),
                (20, 37.0, 141.0, 30.0),
            ],
        )]);

        let first = resolved(locate(t(0), &tracks));
        assert_eq!(first.latitude, 35.123456789);
        assert_eq!(first.longitude, 139.987654321);
        assert_eq!(first.elevation_meters, Some(12.345));

        let last = resolved(locate(t(20), &tracks));
        assert_eq!((last.latitude, last.longitude), (37.0, 141.0));
    }

    #[test]
    fn test_interpolation_stays_on_segment() {
        let tracks = TrackCollection::new(vec![track(
            "a",
            &[(0, 10.0, -20.0, 100.0), (7, 12.0, -26.0, 50.0)],
        )]);

        for step in 1..7 {
            let location = resolved(locate(t(step), &tracks));
            let fraction = step as f64 / 7.0;
            assert!((location.latitude - (10.0 + fraction * 2.0)).abs() < 1e-9);
            assert!((location.longitude - (-20.0 - fraction * 6.0)).abs() < 1e-9);
            let ele = location.elevation_meters.unwrap();
            assert!((ele - (100.0 - fraction * 50.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sub_second_fraction() {
        let tracks = TrackCollection::new(vec![track(
            "a",
            &[(0, 0.0, 0.0, 0.0), (1, 1.0, 2.0, 4.0)],
        )]);

        let location = resolved(locate(t(0) + TimeDelta::milliseconds(250), &tracks));
        assert!((location.latitude - 0.25).abs() < 1e-12);
        assert!((location.longitude - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_outside_range_is_unresolved() {
        let tracks = TrackCollection::new(vec![track(
            "a",
            &[(0, 0.0, 0.0, 0.0), (10, 1.0, 1.0, 10.0)],
        )]);

        for at in [t(-1), t(11)] {
            assert_eq!(
                locate(at, &tracks),
                LocationResult::Unresolved(UnresolvedReason::NoCoverage)
            );
        }
    }

    #[test]
    fn test_empty_collection_is_unresolved() {
        let tracks = TrackCollection::default();
        assert_eq!(
            locate(t(0), &tracks),
            LocationResult::Unresolved(UnresolvedReason::NoCoverage)
        );
    }

    #[test]
    fn test_first_covering_track_wins() {
        let tracks = TrackCollection::new(vec![
            track("early", &[(-100, 0.0, 0.0, 0.0), (-50, 0.0, 0.0, 0.0)]),
            track("coarse", &[(0, 0.0, 0.0, 0.0), (100, 10.0, 10.0, 100.0)]),
            track("fine", &[(49, 7.0, 7.0, 7.0), (51, 8.0, 8.0, 8.0)]),
        ]);

        // "fine" brackets t(50) more tightly, but "coarse" was loaded first.
        let location = resolved(locate(t(50), &tracks));
        assert_eq!(location.latitude, 5.0);
        assert_eq!(location.elevation_meters, Some(50.0));
    }

    #[test]
    fn test_later_track_used_when_earlier_does_not_cover() {
        let tracks = TrackCollection::new(vec![
            track("a", &[(0, 0.0, 0.0, 0.0), (10, 1.0, 1.0, 1.0)]),
            track("b", &[(20, 2.0, 2.0, 2.0), (30, 3.0, 3.0, 3.0)]),
        ]);

        let location = resolved(locate(t(25), &tracks));
        assert_eq!(location.latitude, 2.5);
    }

    #[test]
    fn test_gap_between_tracks_is_unresolved() {
        let tracks = TrackCollection::new(vec![
            track("a", &[(0, 0.0, 0.0, 0.0), (10, 1.0, 1.0, 1.0)]),
            track("b", &[(20, 2.0, 2.0, 2.0), (30, 3.0, 3.0, 3.0)]),
        ]);

        assert!(!locate(t(15), &tracks).is_resolved());
    }

    #[test]
    fn test_max_gap_rejects_wide_brackets() {
        let tracks = TrackCollection::new(vec![track(
            "a",
            &[(0, 0.0, 0.0, 0.0), (10, 1.0, 1.0, 1.0), (3600, 2.0, 2.0, 2.0)],
        )]);
        let options = LocateOptions {
            max_gap: Some(TimeDelta::seconds(60)),
        };

        assert!(locate_with(t(5), &tracks, &options).is_resolved());
        assert!(!locate_with(t(100), &tracks, &options).is_resolved());
        // Exact samples are still returned.
        assert!(locate_with(t(3600), &tracks, &options).is_resolved());
    }

    #[test]
    fn test_missing_elevation_propagates() {
        let mut points = vec![
            TrackPoint::new(t(0), 0.0, 0.0, 0.0),
            TrackPoint::new(t(10), 1.0, 1.0, 10.0),
        ];
        points[1].elevation = None;
        let tracks = TrackCollection::new(vec![Track::new("a", points)]);

        let location = resolved(locate(t(5), &tracks));
        assert_eq!(location.latitude, 0.5);
        assert_eq!(location.elevation_meters, None);

        let exact = resolved(locate(t(0), &tracks));
        assert_eq!(exact.elevation_meters, Some(0.0));
    }

    #[test]
    fn test_single_point_track() {
        let tracks = TrackCollection::new(vec![track("a", &[(0, 4.0, 5.0, 6.0)])]);

        assert!(locate(t(0), &tracks).is_resolved());
        assert!(!locate(t(1), &tracks).is_resolved());
    }
}
