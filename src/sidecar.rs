use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::SidecarError;
use crate::model::Location;
use crate::time::parse_timestamp;
use crate::tool::MetadataTool;

/// Sidecar metadata access needed by the geotag pipeline.
pub trait SidecarIo {
    /// Reads the capture time of the photo described by `sidecar`.
    fn read_capture_timestamp(&mut self, sidecar: &Path) -> Result<DateTime<Utc>, SidecarError>;

    /// Writes the location fields. On failure the sidecar must be left as it was.
    fn write_location(&mut self, sidecar: &Path, location: &Location) -> Result<(), SidecarError>;

    /// Produces the sidecar for `image`, returning its path. An existing
    /// sidecar is reused.
    fn create_sidecar(&mut self, image: &Path) -> Result<PathBuf, SidecarError>;
}

/// Sidecar access through an exiftool-compatible [`MetadataTool`].
pub struct ExifToolSidecar<T> {
    tool: T,
}

impl<T: MetadataTool> ExifToolSidecar<T> {
    pub fn new(tool: T) -> Self {
        Self { tool }
    }

    pub fn into_inner(self) -> T {
        self.tool
    }
}

/// Path of the sidecar exiftool's `%d%f.xmp` would produce for `image`.
pub fn sidecar_path(image: &Path) -> PathBuf {
    image.with_extension("xmp")
}

impl<T: MetadataTool> SidecarIo for ExifToolSidecar<T> {
    fn read_capture_timestamp(&mut self, sidecar: &Path) -> Result<DateTime<Utc>, SidecarError> {
        let args = vec![
            "-s3".to_string(),
            "-DateTimeOriginal".to_string(),
            path_arg(sidecar),
        ];
        let output = self.tool.execute(&args)?;

        let value = output.stdout.trim();
        if value.is_empty() {
            return Err(SidecarError::MissingTimestamp);
        }
        parse_timestamp(value).ok_or_else(|| SidecarError::InvalidTimestamp(value.to_string()))
    }

    fn write_location(&mut self, sidecar: &Path, location: &Location) -> Result<(), SidecarError> {
        let args = write_args(sidecar, location);
        let output = self.tool.execute(&args)?;

        // exiftool reports "unchanged" when the sidecar already holds these
        // exact values.
        let stdout = &output.stdout;
        if stdout.contains("1 image files updated") || stdout.contains("1 image files unchanged") {
            debug!("exiftool: {}", stdout);
            return Ok(());
        }
        Err(SidecarError::WriteFailed(failure_message(
            &output.stdout,
            &output.stderr,
        )))
    }

    fn create_sidecar(&mut self, image: &Path) -> Result<PathBuf, SidecarError> {
        let sidecar = sidecar_path(image);
        if sidecar.exists() {
            debug!("Reusing existing sidecar {:?}", sidecar);
            return Ok(sidecar);
        }

        let args = vec![path_arg(image), "-o".to_string(), "%d%f.xmp".to_string()];
        let output = self.tool.execute(&args)?;

        if output.stdout.contains("1 image files created") {
            return Ok(sidecar);
        }
        Err(SidecarError::CreateFailed(failure_message(
            &output.stdout,
            &output.stderr,
        )))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn write_args(sidecar: &Path, location: &Location) -> Vec<String> {
    let mut args = vec![
        "-overwrite_original".to_string(),
        format!("-XMP:GPSLatitude={}", location.latitude),
        format!("-XMP:GPSLongitude={}", location.longitude),
    ];
    if let Some(elevation) = location.elevation_meters {
        let reference = if elevation < 0.0 { 1 } else { 0 };
        args.push(format!("-XMP:GPSAltitude={}", elevation.abs()));
        args.push(format!("-XMP:GPSAltitudeRef#={reference}"));
    }
    args.push(path_arg(sidecar));
    args
}

fn failure_message(stdout: &str, stderr: &str) -> String {
    let message = if stderr.trim().is_empty() { stdout } else { stderr };
    let message = message.trim();
    if message.is_empty() {
        "no response from metadata tool".to_string()
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::tool::ToolOutput;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    /// Replays canned responses and records the commands it received.
    #[derive(Default)]
    struct ScriptedTool {
        responses: VecDeque<ToolOutput>,
        commands: Vec<Vec<String>>,
    }

    impl ScriptedTool {
        fn replying(stdout: &str, stderr: &str) -> Self {
            let mut tool = Self::default();
            tool.responses.push_back(ToolOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            });
            tool
        }
    }

    impl MetadataTool for ScriptedTool {
        fn execute(&mut self, args: &[String]) -> Result<ToolOutput, ToolError> {
            self.commands.push(args.to_vec());
            self.responses.pop_front().ok_or(ToolError::Closed)
        }
    }

    #[test]
    fn test_read_capture_timestamp() {
        let mut sidecar = ExifToolSidecar::new(ScriptedTool::replying("2024:05:01 12:00:00\n", ""));

        let timestamp = sidecar
            .read_capture_timestamp(Path::new("/photos/a.xmp"))
            .unwrap();
        assert_eq!(timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        let tool = sidecar.into_inner();
        assert_eq!(
            tool.commands,
            vec![vec![
                "-s3".to_string(),
                "-DateTimeOriginal".to_string(),
                "/photos/a.xmp".to_string()
            ]]
        );
    }

    #[test]
    fn test_empty_output_is_missing_timestamp() {
        let mut sidecar = ExifToolSidecar::new(ScriptedTool::replying("", ""));

        assert!(matches!(
            sidecar.read_capture_timestamp(Path::new("a.xmp")),
            Err(SidecarError::MissingTimestamp)
        ));
    }

    #[test]
    fn test_garbage_timestamp_is_invalid() {
        let mut sidecar = ExifToolSidecar::new(ScriptedTool::replying("last tuesday", ""));

        assert!(matches!(
            sidecar.read_capture_timestamp(Path::new("a.xmp")),
            Err(SidecarError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_write_location_args() {
        let mut sidecar =
            ExifToolSidecar::new(ScriptedTool::replying("    1 image files updated", ""));
        let location = Location {
            latitude: -33.5,
            longitude: 151.25,
            elevation_meters: Some(-12.5),
        };

        sidecar
            .write_location(Path::new("a.xmp"), &location)
            .unwrap();

        let tool = sidecar.into_inner();
        assert_eq!(
            tool.commands[0],
            vec![
                "-overwrite_original",
                "-XMP:GPSLatitude=-33.5",
                "-XMP:GPSLongitude=151.25",
                "-XMP:GPSAltitude=12.5",
                "-XMP:GPSAltitudeRef#=1",
                "a.xmp",
            ]
        );
    }

    #[test]
    fn test_write_location_without_elevation() {
        let location = Location {
            latitude: 1.0,
            longitude: 2.0,
            elevation_meters: None,
        };

        let args = write_args(Path::new("a.xmp"), &location);
        assert!(!args.iter().any(|a| a.contains("GPSAltitude")));
    }

    #[test]
    fn test_write_failure_reports_tool_message() {
        let mut sidecar = ExifToolSidecar::new(ScriptedTool::replying(
            "    0 image files updated\n    1 files weren't updated due to errors",
            "Error: File not found - a.xmp",
        ));
        let location = Location {
            latitude: 1.0,
            longitude: 2.0,
            elevation_meters: Some(3.0),
        };

        match sidecar.write_location(Path::new("a.xmp"), &location) {
            Err(SidecarError::WriteFailed(message)) => {
                assert_eq!(message, "Error: File not found - a.xmp")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unchanged_sidecar_counts_as_written() {
        let mut sidecar = ExifToolSidecar::new(ScriptedTool::replying(
            "    0 image files updated\n    1 image files unchanged",
            "",
        ));
        let location = Location {
            latitude: 1.0,
            longitude: 2.0,
            elevation_meters: None,
        };

        assert!(sidecar
            .write_location(Path::new("a.xmp"), &location)
            .is_ok());
    }

    #[test]
    fn test_create_sidecar_runs_tool() {
        let temp_dir = TempDir::new().unwrap();
        let image = temp_dir.path().join("IMG_0001.NEF");
        let mut sidecar =
            ExifToolSidecar::new(ScriptedTool::replying("    1 image files created", ""));

        let created = sidecar.create_sidecar(&image).unwrap();
        assert_eq!(created, temp_dir.path().join("IMG_0001.xmp"));

        let tool = sidecar.into_inner();
        assert_eq!(tool.commands[0][1..], ["-o", "%d%f.xmp"]);
    }

    #[test]
    fn test_create_sidecar_reuses_existing() {
        let temp_dir = TempDir::new().unwrap();
        let image = temp_dir.path().join("IMG_0002.jpg");
        std::fs::write(temp_dir.path().join("IMG_0002.xmp"), "<x:xmpmeta/>").unwrap();
        let mut sidecar = ExifToolSidecar::new(ScriptedTool::default());

        let created = sidecar.create_sidecar(&image).unwrap();
        assert_eq!(created, temp_dir.path().join("IMG_0002.xmp"));
        assert!(sidecar.into_inner().commands.is_empty());
    }

    #[test]
    fn test_tool_failure_propagates() {
        let mut sidecar = ExifToolSidecar::new(ScriptedTool::default());

        assert!(matches!(
            sidecar.read_capture_timestamp(Path::new("a.xmp")),
            Err(SidecarError::Tool(ToolError::Closed))
        ));
    }
}
