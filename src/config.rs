use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use chrono::TimeDelta;

use crate::locate::LocateOptions;
use crate::tool::default_program;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Settings for a geotag batch.
#[derive(Debug, Clone, PartialEq)]
pub struct GeotagConfig {
    /// Number of workers, each with its own exiftool session.
    pub workers: usize,
    pub queue_capacity: usize,
    /// How long an idle worker waits on the queue before re-checking
    /// whether the producer has finished.
    pub poll_interval: Duration,
    /// Largest sample spacing that may be interpolated across.
    pub max_gap: Option<TimeDelta>,
    pub exiftool: PathBuf,
}

impl Default for GeotagConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_gap: None,
            exiftool: default_program(),
        }
    }
}

impl GeotagConfig {
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        if let Some(workers) = workers {
            self.workers = workers.max(1);
        }
        self
    }

    pub fn with_max_gap_secs(mut self, secs: Option<u64>) -> Self {
        self.max_gap = secs.and_then(|s| TimeDelta::try_seconds(i64::try_from(s).ok()?));
        self
    }

    pub fn locate_options(&self) -> LocateOptions {
        LocateOptions {
            max_gap: self.max_gap,
        }
    }
}

/// Available CPU cores, as seen by the OS or else by rayon.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or_else(|_| rayon::current_num_threads())
        .max(1)
}
