use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use super::Review;

/// Base URL for TMDB-hosted artwork
pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

/// Kind of title tracked by the app
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "tv" => Ok(MediaType::Tv),
            other => Err(format!("unknown media type '{}'", other)),
        }
    }
}

/// TMDB genre; search results only carry the id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Normalized title metadata, as fetched from TMDB
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMovie {
    pub tmdb_id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub media_type: MediaType,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    pub release_date: Option<NaiveDate>,
    pub tmdb_popularity: Option<f64>,
    pub tmdb_vote_average: Option<f64>,
    pub tmdb_vote_count: Option<i64>,
}

impl NewMovie {
    pub fn poster_url(&self) -> Option<String> {
        image_url(self.poster_path.as_deref(), "w500")
    }

    pub fn backdrop_url(&self) -> Option<String> {
        image_url(self.backdrop_path.as_deref(), "w1280")
    }

    /// Comma separated genre names, skipping id-only entries
    pub fn genre_names(&self) -> String {
        genre_names(&self.genres)
    }

    /// Four-digit release year or an empty string
    pub fn year(&self) -> String {
        release_year(self.release_date)
    }
}

/// A stored movie or TV show
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: i64,
    pub tmdb_id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub media_type: MediaType,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    pub release_date: Option<NaiveDate>,
    pub tmdb_popularity: Option<f64>,
    pub tmdb_vote_average: Option<f64>,
    pub tmdb_vote_count: Option<i64>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    /// Builds a stored movie from normalized metadata
    pub fn from_new(id: i64, new: NewMovie, now: DateTime<Utc>) -> Self {
        let poster_url = new.poster_url();
        let backdrop_url = new.backdrop_url();
        Self {
            id,
            tmdb_id: new.tmdb_id,
            title: new.title,
            original_title: new.original_title,
            media_type: new.media_type,
            overview: new.overview,
            poster_path: new.poster_path,
            backdrop_path: new.backdrop_path,
            genres: new.genres,
            release_date: new.release_date,
            tmdb_popularity: new.tmdb_popularity,
            tmdb_vote_average: new.tmdb_vote_average,
            tmdb_vote_count: new.tmdb_vote_count,
            poster_url,
            backdrop_url,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn genre_names(&self) -> String {
        genre_names(&self.genres)
    }

    pub fn year(&self) -> String {
        release_year(self.release_date)
    }
}

/// A movie together with its review, if one has been generated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieWithReview {
    pub movie: Movie,
    pub review: Option<Review>,
}

/// A page of movies for browse views
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginatedMovies {
    pub movies: Vec<MovieWithReview>,
    pub total: i64,
    pub page: u32,
    pub pages: u32,
}

/// Browse sections for `GET /api/movies`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MovieCategory {
    Trending,
    #[default]
    Latest,
    WorthIt,
    SkipThese,
    MixedBag,
    HiddenGems,
    Movies,
    TvShows,
}

/// Popularity below which a well-reviewed title counts as a hidden gem
pub const HIDDEN_GEM_POPULARITY: f64 = 50.0;

/// Validated listing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieListQuery {
    pub category: MovieCategory,
    pub page: u32,
    pub limit: u32,
}

impl MovieListQuery {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }

    pub fn pages_for(&self, total: i64) -> u32 {
        if total <= 0 {
            return 0;
        }
        let limit = i64::from(self.limit.max(1));
        ((total + limit - 1) / limit) as u32
    }
}

fn image_url(path: Option<&str>, size: &str) -> Option<String> {
    path.filter(|p| !p.is_empty())
        .map(|p| format!("{}/{}{}", TMDB_IMAGE_BASE, size, p))
}

fn genre_names(genres: &[Genre]) -> String {
    genres
        .iter()
        .filter_map(|g| g.name.as_deref())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn release_year(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y").to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_movie() -> NewMovie {
        NewMovie {
            tmdb_id: 27205,
            title: "Inception".to_string(),
            original_title: None,
            media_type: MediaType::Movie,
            overview: None,
            poster_path: Some("/poster.jpg".to_string()),
            backdrop_path: None,
            genres: vec![
                Genre { id: 28, name: Some("Action".to_string()) },
                Genre { id: 878, name: None },
                Genre { id: 12, name: Some("Adventure".to_string()) },
            ],
            release_date: NaiveDate::from_ymd_opt(2010, 7, 15),
            tmdb_popularity: None,
            tmdb_vote_average: None,
            tmdb_vote_count: None,
        }
    }

    #[test]
    fn test_media_type_round_trip() {
        assert_eq!("tv".parse::<MediaType>().unwrap(), MediaType::Tv);
        assert_eq!(MediaType::Movie.to_string(), "movie");
        assert!("anime".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_image_urls() {
        let movie = new_movie();
        assert_eq!(
            movie.poster_url(),
            Some("https://image.tmdb.org/t/p/w500/poster.jpg".to_string())
        );
        assert_eq!(movie.backdrop_url(), None);
    }

    #[test]
    fn test_genre_names_skip_unnamed() {
        assert_eq!(new_movie().genre_names(), "Action, Adventure");
    }

    #[test]
    fn test_year() {
        assert_eq!(new_movie().year(), "2010");
    }

    #[test]
    fn test_category_serde() {
        let category: MovieCategory = serde_json::from_str("\"hidden-gems\"").unwrap();
        assert_eq!(category, MovieCategory::HiddenGems);
    }

    #[test]
    fn test_pagination_math() {
        let query = MovieListQuery {
            category: MovieCategory::Latest,
            page: 3,
            limit: 20,
        };
        assert_eq!(query.offset(), 40);
        assert_eq!(query.pages_for(0), 0);
        assert_eq!(query.pages_for(41), 3);
        assert_eq!(query.pages_for(40), 2);
    }
}
