pub mod batch;
pub mod config;
pub mod discover;
pub mod distribute;
pub mod error;
pub mod locate;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod queue;
pub mod sidecar;
pub mod store;
pub mod time;
pub mod tool;

pub use batch::{geotag_images, geotag_sidecars, BatchSummary};
pub use config::GeotagConfig;
pub use locate::{locate, locate_with, LocateOptions};
pub use model::{Location, LocationResult, Track, TrackPoint, UnresolvedReason};
pub use store::TrackCollection;
