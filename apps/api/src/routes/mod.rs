pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::popularity::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/popularity",
            get(handlers::handle_list).post(handlers::handle_seed),
        )
        .route(
            "/popularity/pair-to-battle",
            get(handlers::handle_pair_to_battle),
        )
        .route(
            "/popularity/vote/:session_id/:winner_id",
            post(handlers::handle_vote),
        )
        .route("/popularity/top/:n", get(handlers::handle_top))
        .route("/popularity/:entity_id", get(handlers::handle_get_rating))
        .with_state(state)
}
