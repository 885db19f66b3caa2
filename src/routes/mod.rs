use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::{
    make_span_with_request_id, request_id_middleware, request_id::REQUEST_ID_HEADER,
    USER_ID_HEADER,
};

pub mod movies;
pub mod search;
pub mod state;
pub mod versus;
pub mod watchlist;

pub use state::{AppState, Providers, Settings};

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.allowed_origins);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .with_state(state)
}

/// API routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(search::search))
        .route("/search/generate/:tmdb_id", post(search::generate))
        .route("/search/regenerate/:tmdb_id", post(search::regenerate))
        .route("/search/status/:tmdb_id", get(search::status))
        .route("/search/stream/:tmdb_id", get(search::stream_updates))
        .route("/movies", get(movies::list))
        .route("/movies/:tmdb_id", get(movies::get))
        .route("/watchlist", get(watchlist::list).post(watchlist::add))
        .route("/watchlist/:tmdb_id", delete(watchlist::remove))
        .route("/versus/battle", post(versus::battle))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
