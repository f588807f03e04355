use chrono::{DateTime, NaiveDateTime, Utc};

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"];
const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parses a timestamp as written by GPS loggers, EXIF or XMP.
///
/// Accepts `YYYY-MM-DDTHH:MM:SS` and the EXIF `YYYY:MM:DD HH:MM:SS` form,
/// optional fractional seconds, and an optional `Z` or `±HH:MM` offset.
/// Seconds may be left out entirely (`HH:MM`), as some XMP writers do.
/// A timestamp without an offset is taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let normalized = normalize(text.trim())?;

    if let Some(naive) = normalized.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(naive, NAIVE_FORMAT)
            .ok()
            .map(|dt| dt.and_utc());
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    NaiveDateTime::parse_from_str(&normalized, NAIVE_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

// EXIF writes "2024:05:01 12:00:00"; rewrite the date separators and the
// date/time separator into ISO form. Only the first 10 bytes are touched so
// offsets like "+02:00" survive. A missing seconds field becomes ":00".
fn normalize(text: &str) -> Option<String> {
    if text.len() < 16 || !text.is_char_boundary(10) || !text.is_char_boundary(16) {
        return None;
    }
    let (date, rest) = text.split_at(10);
    let date = date.replace(':', "-");
    let rest = match rest.strip_prefix(' ') {
        Some(time) => format!("T{time}"),
        None => rest.to_string(),
    };
    let mut iso = format!("{date}{rest}");
    if iso.as_bytes().get(16) != Some(&b':') {
        iso.insert_str(16, ":00");
    }
    Some(iso)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_rfc3339_utc() {
        assert_eq!(
            parse_timestamp("2024-05-01T12:30:45Z"),
            Some(utc(2024, 5, 1, 12, 30, 45))
        );
    }

    #[test]
    fn test_parse_with_offset() {
        assert_eq!(
            parse_timestamp("2024-05-01T14:30:45+02:00"),
            Some(utc(2024, 5, 1, 12, 30, 45))
        );
        assert_eq!(
            parse_timestamp("2024:05:01 07:30:45-05:00"),
            Some(utc(2024, 5, 1, 12, 30, 45))
        );
    }

    #[test]
    fn test_parse_exif_without_offset_is_utc() {
        assert_eq!(
            parse_timestamp("2024:05:01 12:30:45"),
            Some(utc(2024, 5, 1, 12, 30, 45))
        );
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let parsed = parse_timestamp("2024-05-01T12:30:45.250Z").unwrap();
        assert_eq!(parsed.timestamp_subsec_millis(), 250);
        assert_eq!(parsed.timestamp(), utc(2024, 5, 1, 12, 30, 45).timestamp());
    }

    #[test]
    fn test_parse_without_seconds() {
        assert_eq!(
            parse_timestamp("2024:05:01 10:00"),
            Some(utc(2024, 5, 1, 10, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2024-05-01T10:00+02:00"),
            Some(utc(2024, 5, 1, 8, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2024-05-01T10:00Z"),
            Some(utc(2024, 5, 1, 10, 0, 0))
        );
        assert_eq!(parse_timestamp("2024:05:01 10"), None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-01T00:00:00Z"), None);
        assert_eq!(parse_timestamp("0000:00:00 00:00:00"), None);
    }
}
