use std::sync::Arc;

use crate::{
    db::MovieStore,
    error::{AppError, AppResult},
    models::{SearchHit, SearchResponse, MAX_TMDB_RESULTS},
    services::providers::MetadataProvider,
};

const MAX_QUERY_CHARS: usize = 200;
const DB_MATCH_LIMIT: i64 = 5;

/// Title search across stored reviews and TMDB
pub struct SearchService {
    store: Arc<dyn MovieStore>,
    metadata: Arc<dyn MetadataProvider>,
}

impl SearchService {
    pub fn new(store: Arc<dyn MovieStore>, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self { store, metadata }
    }

    pub fn validate_query(query: &str) -> AppResult<&str> {
        let query = query.trim();
        let len = query.chars().count();
        if len == 0 || len > MAX_QUERY_CHARS {
            return Err(AppError::InvalidInput(format!(
                "q must be between 1 and {} characters",
                MAX_QUERY_CHARS
            )));
        }
        Ok(query)
    }

    /// Logs the search, then returns the best stored match plus TMDB candidates
    pub async fn search(&self, query: &str, ip_hash: &str) -> AppResult<SearchResponse> {
        let query = Self::validate_query(query)?;

        if let Err(e) = self.store.record_search(query, ip_hash).await {
            tracing::warn!(error = %e, "Failed to record search event");
        }

        let stored = self.store.search_movies(query, DB_MATCH_LIMIT).await?;
        let movie = stored.into_iter().find(|m| m.review.is_some());

        let tmdb_results = match self.metadata.search(query).await {
            Ok(results) => results,
            Err(e) if movie.is_some() => {
                tracing::warn!(error = %e, "TMDB search failed, returning stored match only");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        Ok(SearchResponse {
            found_in_db: movie.is_some(),
            generation_status: movie.as_ref().map(|_| "completed".to_string()),
            movie,
            tmdb_results: tmdb_results
                .into_iter()
                .take(MAX_TMDB_RESULTS)
                .map(SearchHit::from)
                .collect(),
        })
    }
}
