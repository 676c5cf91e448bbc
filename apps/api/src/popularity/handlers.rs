use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::models::popularity::{PairResult, RatingRecord};
use crate::state::AppState;

/// Lowest Pokédex number handed out for comparisons.
const FIRST_POKEMON_ID: i32 = 1;

#[derive(Deserialize)]
pub struct SeedRequest {
    pub entity_id: i32,
    pub rating: Option<i32>,
}

/// GET /popularity
pub async fn handle_list(
    State(state): State<AppState>,
) -> Result<Json<Vec<RatingRecord>>, AppError> {
    Ok(Json(state.ratings.all().await?))
}

/// POST /popularity
pub async fn handle_seed(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SeedRequest>,
) -> Result<(StatusCode, Json<RatingRecord>), AppError> {
    let record = state.ratings.seed(req.entity_id, req.rating).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /popularity/pair-to-battle
pub async fn handle_pair_to_battle(
    State(state): State<AppState>,
) -> Result<Json<PairResult>, AppError> {
    let pair = state
        .pairing
        .create_pair(FIRST_POKEMON_ID, state.config.last_pokemon_id)
        .await?;
    Ok(Json(pair))
}

/// POST /popularity/vote/:session_id/:winner_id
pub async fn handle_vote(
    State(state): State<AppState>,
    ApiPath((session_id, winner_id)): ApiPath<(String, i32)>,
) -> Result<Json<PairResult>, AppError> {
    Ok(Json(state.pairing.resolve_vote(&session_id, winner_id).await?))
}

/// GET /popularity/top/:n
pub async fn handle_top(
    State(state): State<AppState>,
    ApiPath(n): ApiPath<u32>,
) -> Result<Json<Vec<RatingRecord>>, AppError> {
    Ok(Json(state.ratings.top(n).await?))
}

/// GET /popularity/:entity_id
pub async fn handle_get_rating(
    State(state): State<AppState>,
    ApiPath(entity_id): ApiPath<i32>,
) -> Result<Json<RatingRecord>, AppError> {
    Ok(Json(state.ratings.rating_of(entity_id).await?))
}
