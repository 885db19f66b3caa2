use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MediaType;

/// One saved title on a user's watchlist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchlistEntry {
    pub tmdb_id: i64,
    pub media_type: MediaType,
    pub title: String,
    pub poster_path: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Body of `POST /api/watchlist`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AddWatchlistRequest {
    pub tmdb_id: i64,
    #[serde(default)]
    pub media_type: MediaType,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
}

impl AddWatchlistRequest {
    /// Returns a description of the first invalid field, if any
    pub fn validation_error(&self) -> Option<String> {
        if self.tmdb_id <= 0 {
            return Some("tmdb_id must be a positive integer".to_string());
        }
        let title = self.title.trim();
        if title.is_empty() {
            return Some("title cannot be empty".to_string());
        }
        if title.chars().count() > 500 {
            return Some("title must be at most 500 characters".to_string());
        }
        None
    }
}
