use std::io::BufRead;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::error::TrackLoadError;
use crate::model::TrackPoint;
use crate::time::parse_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Elevation,
    Time,
}

#[derive(Debug, Default)]
struct PendingPoint {
    latitude: f64,
    longitude: f64,
    elevation: Option<f64>,
    time: Option<String>,
}

/// Reads every `<trkpt>` and `<rtept>` of a GPX document.
///
/// Points are returned in document order. Points without a `<time>` are
/// skipped since they cannot be matched against a capture time. Any value
/// that is present but unparsable fails the whole file.
pub fn parse_gpx<R: BufRead>(input: R, path: &Path) -> Result<Vec<TrackPoint>, TrackLoadError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let xml_error = |source| TrackLoadError::Xml {
        path: path.to_path_buf(),
        source,
    };

    let mut buf = Vec::new();
    let mut points = Vec::new();
    let mut pending: Option<PendingPoint> = None;
    let mut field: Option<Field> = None;
    let mut skipped = 0usize;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"trkpt" | b"rtept" => {
                    pending = Some(read_position(&e, path)?);
                }
                b"ele" if pending.is_some() => field = Some(Field::Elevation),
                b"time" if pending.is_some() => field = Some(Field::Time),
                _ => {}
            },
            Event::Empty(e) => {
                // A self-closing point carries no time.
                if matches!(e.local_name().as_ref(), b"trkpt" | b"rtept") {
                    read_position(&e, path)?;
                    skipped += 1;
                }
            }
            Event::Text(t) => {
                if let (Some(current), Some(point)) = (field, pending.as_mut()) {
                    let text = String::from_utf8_lossy(&t).trim().to_string();
                    match current {
                        Field::Elevation => {
                            point.elevation = Some(parse_number(&text, "ele", path)?);
                        }
                        Field::Time => point.time = Some(text),
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"ele" | b"time" => field = None,
                b"trkpt" | b"rtept" => {
                    if let Some(point) = pending.take() {
                        match finish_point(point, path)? {
                            Some(point) => points.push(point),
                            None => skipped += 1,
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if skipped > 0 {
        warn!(
            "Skipped {} track points without time in {}",
            skipped,
            path.display()
        );
    }
    debug!("Parsed {} track points from {}", points.len(), path.display());

    Ok(points)
}

fn read_position(e: &BytesStart, path: &Path) -> Result<PendingPoint, TrackLoadError> {
    let mut latitude = None;
    let mut longitude = None;

    for attr in e.attributes() {
        let attr = attr.map_err(|source| TrackLoadError::Xml {
            path: path.to_path_buf(),
            source: source.into(),
        })?;
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        match attr.key.local_name().as_ref() {
            b"lat" => latitude = Some(parse_degrees(&value, "lat", 90.0, path)?),
            b"lon" => longitude = Some(parse_degrees(&value, "lon", 180.0, path)?),
            _ => {}
        }
    }

    let missing = |field: &'static str| TrackLoadError::InvalidCoordinate {
        path: path.to_path_buf(),
        field,
        value: String::new(),
    };

    Ok(PendingPoint {
        latitude: latitude.ok_or_else(|| missing("lat"))?,
        longitude: longitude.ok_or_else(|| missing("lon"))?,
        ..PendingPoint::default()
    })
}

fn finish_point(point: PendingPoint, path: &Path) -> Result<Option<TrackPoint>, TrackLoadError> {
    let Some(time) = point.time else {
        return Ok(None);
    };
    let timestamp = parse_timestamp(&time).ok_or_else(|| TrackLoadError::InvalidTimestamp {
        path: path.to_path_buf(),
        value: time.clone(),
    })?;

    Ok(Some(TrackPoint {
        timestamp,
        latitude: point.latitude,
        longitude: point.longitude,
        elevation: point.elevation,
    }))
}

fn parse_number(text: &str, field: &'static str, path: &Path) -> Result<f64, TrackLoadError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TrackLoadError::InvalidCoordinate {
            path: path.to_path_buf(),
            field,
            value: text.to_string(),
        })
}

fn parse_degrees(
    text: &str,
    field: &'static str,
    limit: f64,
    path: &Path,
) -> Result<f64, TrackLoadError> {
    let value = parse_number(text, field, path)?;
    if value.abs() > limit {
        return Err(TrackLoadError::InvalidCoordinate {
            path: path.to_path_buf(),
            field,
            value: text.to_string(),
        });
    }
    Ok(value)
}
