use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{stream, Stream};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    error::{AppError, AppResult},
    middleware::{Charge, ClientIp},
    models::{GenerationMode, GenerationUpdate, MediaType, SearchResponse, StartResponse},
    routes::AppState,
    services::{GenerationRequest, UpdateFeed},
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaTypeQuery {
    media_type: Option<String>,
}

impl MediaTypeQuery {
    fn parse(&self) -> AppResult<MediaType> {
        match self.media_type.as_deref() {
            None => Ok(MediaType::Movie),
            Some(value) => value
                .parse()
                .map_err(|_| AppError::InvalidInput("media_type must be 'movie' or 'tv'".to_string())),
        }
    }
}

fn positive_id(tmdb_id: i64) -> AppResult<i64> {
    if tmdb_id <= 0 {
        return Err(AppError::InvalidInput(
            "tmdb_id must be a positive integer".to_string(),
        ));
    }
    Ok(tmdb_id)
}

/// Handler for `GET /api/search`
pub async fn search(
    State(state): State<AppState>,
    ip: ClientIp,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<SearchResponse>> {
    let ip_hash = ip.hashed(&state.settings.ip_hash_salt);
    let response = state.search.search(&params.q, &ip_hash).await?;
    Ok(Json(response))
}

/// Handler for `POST /api/search/generate/:tmdb_id`
pub async fn generate(
    State(state): State<AppState>,
    ip: ClientIp,
    Path(tmdb_id): Path<i64>,
    Query(params): Query<MediaTypeQuery>,
) -> AppResult<Json<StartResponse>> {
    start(state, ip, tmdb_id, params.parse()?, GenerationMode::Fresh).await
}

/// Handler for `POST /api/search/regenerate/:tmdb_id`
pub async fn regenerate(
    State(state): State<AppState>,
    ip: ClientIp,
    Path(tmdb_id): Path<i64>,
    Query(params): Query<MediaTypeQuery>,
) -> AppResult<Json<StartResponse>> {
    start(state, ip, tmdb_id, params.parse()?, GenerationMode::Regenerate).await
}

async fn start(
    state: AppState,
    ip: ClientIp,
    tmdb_id: i64,
    media_type: MediaType,
    mode: GenerationMode,
) -> AppResult<Json<StartResponse>> {
    let tmdb_id = positive_id(tmdb_id)?;

    // Existing reviews and running jobs are free
    if let Some(status) = state.generation.precheck(tmdb_id, mode).await? {
        return Ok(Json(StartResponse { status, tmdb_id }));
    }

    state.limiter.check(ip.as_str(), Charge::Generation)?;

    let status = state.generation.launch(GenerationRequest {
        tmdb_id,
        media_type,
        mode,
    });
    Ok(Json(StartResponse { status, tmdb_id }))
}

/// Handler for `GET /api/search/status/:tmdb_id`
pub async fn status(
    State(state): State<AppState>,
    Path(tmdb_id): Path<i64>,
) -> AppResult<Json<GenerationUpdate>> {
    let update = state.generation.status(positive_id(tmdb_id)?).await?;
    Ok(Json(update))
}

/// Handler for `GET /api/search/stream/:tmdb_id`
///
/// Emits the current state first, then every update until a terminal one.
pub async fn stream_updates(
    State(state): State<AppState>,
    Path(tmdb_id): Path<i64>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let feed = state.generation.subscribe(positive_id(tmdb_id)?).await?;
    Ok(Sse::new(update_stream(feed)).keep_alive(KeepAlive::default()))
}

enum StreamState {
    Emit(GenerationUpdate, Option<broadcast::Receiver<GenerationUpdate>>),
    Listen(broadcast::Receiver<GenerationUpdate>),
    Done,
}

fn update_stream(feed: UpdateFeed) -> impl Stream<Item = Result<Event, Infallible>> {
    let initial = match feed {
        UpdateFeed::Live { current, updates } => StreamState::Emit(current, Some(updates)),
        UpdateFeed::Final(update) => StreamState::Emit(update, None),
    };

    stream::unfold(initial, |state| async move {
        match state {
            StreamState::Done => None,
            StreamState::Emit(update, updates) => {
                let next = match updates {
                    Some(updates) if !update.is_terminal() => StreamState::Listen(updates),
                    _ => StreamState::Done,
                };
                Some((Ok(to_event(&update)), next))
            }
            StreamState::Listen(mut updates) => loop {
                match updates.recv().await {
                    Ok(update) => {
                        let next = if update.is_terminal() {
                            StreamState::Done
                        } else {
                            StreamState::Listen(updates)
                        };
                        return Some((Ok(to_event(&update)), next));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "SSE subscriber lagged behind job updates");
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
        }
    })
}

fn to_event(update: &GenerationUpdate) -> Event {
    let data = serde_json::to_string(update).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to encode generation update");
        r#"{"status":"error","error":"Failed to encode update"}"#.to_string()
    });
    Event::default().event(update.event_name()).data(data)
}
