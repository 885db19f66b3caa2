use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::{Charge, ClientIp},
    models::BattleResult,
    routes::AppState,
    services::BattleService,
};

#[derive(Debug, Deserialize)]
pub struct BattleQuery {
    movie_a_id: i64,
    movie_b_id: i64,
}

/// Handler for `POST /api/versus/battle`
///
/// Cached pairs are served without touching the rate limiter.
pub async fn battle(
    State(state): State<AppState>,
    ip: ClientIp,
    Query(params): Query<BattleQuery>,
) -> AppResult<Json<BattleResult>> {
    let (a, b) = (params.movie_a_id, params.movie_b_id);
    BattleService::validate_pair(a, b)?;

    if let Some(cached) = state.battles.cached(a, b).await? {
        tracing::debug!(movie_a_id = a, movie_b_id = b, "Serving cached battle");
        return Ok(Json(cached));
    }

    state.limiter.check(ip.as_str(), Charge::OnDemand)?;
    let result = state.battles.fight(a, b).await?;
    Ok(Json(result))
}
