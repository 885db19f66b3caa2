use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    middleware::UserId,
    models::{AddWatchlistRequest, WatchlistEntry},
    routes::AppState,
};

/// Handler for `GET /api/watchlist`
pub async fn list(
    State(state): State<AppState>,
    user: UserId,
) -> AppResult<Json<Vec<WatchlistEntry>>> {
    let entries = state.watchlist.list(user.as_str()).await?;
    Ok(Json(entries))
}

/// Handler for `POST /api/watchlist`
pub async fn add(
    State(state): State<AppState>,
    user: UserId,
    Json(request): Json<AddWatchlistRequest>,
) -> AppResult<Json<WatchlistEntry>> {
    let entry = state.watchlist.add(user.as_str(), request).await?;
    Ok(Json(entry))
}

/// Handler for `DELETE /api/watchlist/:tmdb_id`
pub async fn remove(
    State(state): State<AppState>,
    user: UserId,
    Path(tmdb_id): Path<i64>,
) -> AppResult<StatusCode> {
    state.watchlist.remove(user.as_str(), tmdb_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
