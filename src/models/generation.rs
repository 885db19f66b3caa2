use serde::{Deserialize, Serialize};

use super::MovieWithReview;

/// Progress message used before the pipeline reports its first step
pub const INITIAL_PROGRESS: &str = "Preparing...";

/// Status of a review generation job, as seen by clients
///
/// The same JSON shape is returned by the status endpoint and carried in the
/// `data:` field of every server-sent event; the SSE event name is the
/// `status` value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationUpdate {
    NotFound,
    Generating { progress: String },
    Completed { movie: Box<MovieWithReview> },
    Error { error: String },
}

impl GenerationUpdate {
    pub fn event_name(&self) -> &'static str {
        match self {
            GenerationUpdate::NotFound => "not_found",
            GenerationUpdate::Generating { .. } => "generating",
            GenerationUpdate::Completed { .. } => "completed",
            GenerationUpdate::Error { .. } => "error",
        }
    }

    /// Completed and error end a job; nothing follows them
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GenerationUpdate::Completed { .. } | GenerationUpdate::Error { .. }
        )
    }
}

/// Whether a generation request should keep or replace an existing review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Fresh,
    Regenerate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StartStatus {
    Generating,
    AlreadyExists,
}

/// Response to a generate/regenerate request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartResponse {
    pub status: StartStatus,
    pub tmdb_id: i64,
}
