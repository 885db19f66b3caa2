//! Client side of review generation: start a job, then follow it over
//! server-sent events, falling back to polling the status endpoint.

pub mod api;
pub mod progress;
pub mod revalidate;
pub mod sse;
pub mod tracker;

pub use api::{ClientError, ReviewApi};
pub use progress::{ProgressPresenter, ProgressView};
pub use revalidate::{review_path, HttpRevalidator, NoopRevalidator, Revalidator};
pub use sse::{SseDecoder, SseEvent};
pub use tracker::{
    ErrorKind, Phase, ReviewTracker, TitleRef, TrackerConfig, TrackerError, TrackerState,
    Transport,
};
