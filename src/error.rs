use std::path::PathBuf;

use thiserror::Error;

use crate::model::UnresolvedReason;
use crate::pipeline::Stage;

/// Failure while loading GPX track logs. Always fatal for a batch.
#[derive(Debug, Error)]
pub enum TrackLoadError {
    #[error("GPX directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed GPX in {}: {source}", path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    #[error("invalid {field} value {value:?} in {}", path.display())]
    InvalidCoordinate {
        path: PathBuf,
        field: &'static str,
        value: String,
    },

    #[error("invalid track point time {value:?} in {}", path.display())]
    InvalidTimestamp { path: PathBuf, value: String },
}

/// Failure talking to the external metadata tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on metadata tool session: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata tool session closed unexpectedly")]
    Closed,
}

/// Failure reading or writing a single sidecar file.
#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("no capture timestamp in sidecar")]
    MissingTimestamp,

    #[error("unparsable capture timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("sidecar creation failed: {0}")]
    CreateFailed(String),

    #[error("sidecar write failed: {0}")]
    WriteFailed(String),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Per-file pipeline failure. Logged and skipped, never fatal for a batch.
#[derive(Debug, Error)]
pub enum GeotagError {
    #[error("missing capture timestamp: {0}")]
    MissingTimestamp(#[source] SidecarError),

    #[error("no track covers {0}")]
    NoCoverage(chrono::DateTime<chrono::Utc>),

    #[error("could not create sidecar: {0}")]
    Create(#[source] SidecarError),

    #[error("could not write location: {0}")]
    Write(#[source] SidecarError),

    /// The worker's metadata tool session died. The file itself may be fine.
    #[error("metadata tool failed: {source}")]
    Tool {
        stage: Stage,
        #[source]
        source: ToolError,
    },
}

impl GeotagError {
    /// The pipeline stage the file was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            GeotagError::Create(_) => Stage::Image,
            GeotagError::MissingTimestamp(_) => Stage::Discovered,
            GeotagError::NoCoverage(_) => Stage::TimestampExtracted,
            GeotagError::Write(_) => Stage::LocationResolved,
            GeotagError::Tool { stage, .. } => *stage,
        }
    }

    /// Why no location could be attached, for files that were read but
    /// could not be placed on any track.
    pub fn unresolved_reason(&self) -> Option<UnresolvedReason> {
        match self {
            GeotagError::MissingTimestamp(SidecarError::MissingTimestamp) => {
                Some(UnresolvedReason::MissingTimestamp)
            }
            GeotagError::NoCoverage(_) => Some(UnresolvedReason::NoCoverage),
            _ => None,
        }
    }

    /// Whether the worker's session must be replaced before it can go on.
    pub fn is_session_lost(&self) -> bool {
        matches!(self, GeotagError::Tool { .. })
    }
}
