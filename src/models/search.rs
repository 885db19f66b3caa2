use serde::{Deserialize, Serialize};

use super::{MovieWithReview, NewMovie};

/// Max TMDB candidates returned for disambiguation
pub const MAX_TMDB_RESULTS: usize = 8;

/// A TMDB candidate with ready-to-use artwork URLs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    #[serde(flatten)]
    pub movie: NewMovie,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
}

impl From<NewMovie> for SearchHit {
    fn from(movie: NewMovie) -> Self {
        Self {
            poster_url: movie.poster_url(),
            backdrop_url: movie.backdrop_url(),
            movie,
        }
    }
}

/// Body of `GET /api/search`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub found_in_db: bool,
    pub movie: Option<MovieWithReview>,
    pub tmdb_results: Vec<SearchHit>,
    pub generation_status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;

    #[test]
    fn test_hit_flattens_movie_fields() {
        let hit = SearchHit::from(NewMovie {
            tmdb_id: 603,
            title: "The Matrix".to_string(),
            original_title: None,
            media_type: MediaType::Movie,
            overview: None,
            poster_path: Some("/m.jpg".to_string()),
            backdrop_path: None,
            genres: vec![],
            release_date: None,
            tmdb_popularity: None,
            tmdb_vote_average: None,
            tmdb_vote_count: None,
        });
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["tmdb_id"], 603);
        assert_eq!(json["media_type"], "movie");
        assert_eq!(json["poster_url"], "https://image.tmdb.org/t/p/w500/m.jpg");
        assert!(json["backdrop_url"].is_null());
    }
}
