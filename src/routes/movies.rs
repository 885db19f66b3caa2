use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{MovieCategory, MovieListQuery, MovieWithReview, PaginatedMovies},
    routes::AppState,
};

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    page: Option<u32>,
    limit: Option<u32>,
    category: Option<String>,
}

impl ListParams {
    fn validate(self) -> AppResult<MovieListQuery> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::InvalidInput("page must be at least 1".to_string()));
        }

        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        let category = match self.category {
            None => MovieCategory::default(),
            Some(raw) => serde_json::from_value(serde_json::Value::String(raw.clone()))
                .map_err(|_| AppError::InvalidInput(format!("unknown category '{}'", raw)))?,
        };

        Ok(MovieListQuery {
            category,
            page,
            limit,
        })
    }
}

/// Handler for `GET /api/movies`
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<PaginatedMovies>> {
    let page = state.movies.list_movies(params.validate()?).await?;
    Ok(Json(page))
}

/// Handler for `GET /api/movies/:tmdb_id`
pub async fn get(
    State(state): State<AppState>,
    Path(tmdb_id): Path<i64>,
) -> AppResult<Json<MovieWithReview>> {
    state
        .movies
        .find_movie(tmdb_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Movie {} not found", tmdb_id)))
}
