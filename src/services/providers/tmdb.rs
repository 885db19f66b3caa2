use chrono::NaiveDate;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;

use crate::{
    cached,
    db::{
        redis::{DETAILS_TTL, SEARCH_TTL},
        Cache, CacheKey,
    },
    error::{AppError, AppResult},
    models::{Genre, MediaType, NewMovie},
};

/// Title metadata source
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Multi-search restricted to movies and TV shows
    async fn search(&self, query: &str) -> AppResult<Vec<NewMovie>>;

    /// Full details for one title; `NotFound` when TMDB has no such id
    async fn details(&self, tmdb_id: i64, media_type: MediaType) -> AppResult<NewMovie>;
}

/// A raw TMDB search or details item; movies and shows use different field names
#[derive(Debug, Deserialize)]
pub struct TmdbItem {
    pub id: i64,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub genres: Option<Vec<Genre>>,
    #[serde(default)]
    pub genre_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
}

impl TmdbItem {
    /// Normalizes into `NewMovie`; `None` for people and other non-title results
    pub fn normalize(self, default_media_type: MediaType) -> Option<NewMovie> {
        let media_type = match self.media_type.as_deref() {
            None => default_media_type,
            Some(kind) => kind.parse().ok()?,
        };

        let title = non_empty(self.title)
            .or_else(|| non_empty(self.name))
            .unwrap_or_else(|| "Unknown".to_string());

        let release_date = non_empty(self.release_date)
            .or_else(|| non_empty(self.first_air_date))
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok());

        let genres = match (self.genres, self.genre_ids) {
            (Some(genres), _) if !genres.is_empty() => genres,
            (_, Some(ids)) => ids.into_iter().map(|id| Genre { id, name: None }).collect(),
            _ => Vec::new(),
        };

        Some(NewMovie {
            tmdb_id: self.id,
            title,
            original_title: non_empty(self.original_title).or_else(|| non_empty(self.original_name)),
            media_type,
            overview: non_empty(self.overview),
            poster_path: non_empty(self.poster_path),
            backdrop_path: non_empty(self.backdrop_path),
            genres,
            release_date,
            tmdb_popularity: self.popularity,
            tmdb_vote_average: self.vote_average,
            tmdb_vote_count: self.vote_count,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<TmdbItem>,
}

/// TMDB v3 API client with Redis-backed response caching
#[derive(Clone)]
pub struct TmdbClient {
    http_client: HttpClient,
    base_url: String,
    api_key: String,
    cache: Cache,
}

impl TmdbClient {
    pub fn new(cache: Cache, base_url: String, api_key: String) -> Self {
        Self {
            http_client: HttpClient::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url,
            api_key,
            cache,
        }
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> AppResult<T> {
        let response = self
            .http_client
            .get(format!("{}{}", self.base_url.trim_end_matches('/'), endpoint))
            .bearer_auth(&self.api_key)
            .header("accept", "application/json")
            .query(query)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(AppError::NotFound(format!(
                "TMDB has no title at {}",
                endpoint
            ))),
            status => Err(AppError::ExternalApi(format!(
                "TMDB returned status {} for {}",
                status, endpoint
            ))),
        }
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbClient {
    async fn search(&self, query: &str) -> AppResult<Vec<NewMovie>> {
        cached!(
            self.cache,
            CacheKey::TmdbSearch(query.to_string()),
            SEARCH_TTL,
            async {
                let page: SearchPage = self.get("/search/multi", &[("query", query)]).await?;
                let titles: Vec<NewMovie> = page
                    .results
                    .into_iter()
                    .filter(|item| item.media_type.is_some())
                    .filter_map(|item| item.normalize(MediaType::Movie))
                    .collect();
                tracing::debug!(query, results = titles.len(), "TMDB search");
                Ok::<_, AppError>(titles)
            }
        )
    }

    async fn details(&self, tmdb_id: i64, media_type: MediaType) -> AppResult<NewMovie> {
        cached!(
            self.cache,
            CacheKey::TmdbDetails(media_type, tmdb_id),
            DETAILS_TTL,
            async {
                let item: TmdbItem = self
                    .get(&format!("/{}/{}", media_type, tmdb_id), &[])
                    .await?;
                let mut movie = item.normalize(media_type).ok_or_else(|| {
                    AppError::ExternalApi(format!("TMDB returned an unusable item for {}", tmdb_id))
                })?;
                // Details responses omit media_type; trust the endpoint we asked
                movie.media_type = media_type;
                Ok::<_, AppError>(movie)
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(json: serde_json::Value) -> TmdbItem {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_normalize_tv_search_result() {
        let movie = item(serde_json::json!({
            "id": 1396,
            "media_type": "tv",
            "name": "Breaking Bad",
            "original_name": "Breaking Bad",
            "first_air_date": "2008-01-20",
            "genre_ids": [18, 80],
            "popularity": 400.5,
            "vote_average": 8.9
        }))
        .normalize(MediaType::Movie)
        .unwrap();

        assert_eq!(movie.title, "Breaking Bad");
        assert_eq!(movie.media_type, MediaType::Tv);
        assert_eq!(movie.release_date, NaiveDate::from_ymd_opt(2008, 1, 20));
        assert_eq!(movie.genres, vec![Genre { id: 18, name: None }, Genre { id: 80, name: None }]);
    }

    #[test]
    fn test_normalize_skips_people() {
        let person = item(serde_json::json!({"id": 1, "media_type": "person", "name": "Someone"}));
        assert!(person.normalize(MediaType::Movie).is_none());
    }

    #[test]
    fn test_normalize_handles_bad_dates_and_missing_title() {
        let movie = item(serde_json::json!({
            "id": 7,
            "release_date": "",
            "genres": [{"id": 28, "name": "Action"}]
        }))
        .normalize(MediaType::Movie)
        .unwrap();

        assert_eq!(movie.title, "Unknown");
        assert_eq!(movie.release_date, None);
        assert_eq!(movie.genre_names(), "Action");
    }

    #[test]
    fn test_normalize_rejects_garbage_date() {
        let movie = item(serde_json::json!({"id": 8, "title": "X", "release_date": "soon"}))
            .normalize(MediaType::Movie)
            .unwrap();
        assert_eq!(movie.release_date, None);
    }
}
