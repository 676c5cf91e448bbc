mod config;
mod db;
mod errors;
mod extract;
mod models;
mod popularity;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StoreBackend};
use crate::db::create_pool;
use crate::popularity::clock::SystemClock;
use crate::popularity::pairing::ThreadRngSampler;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PokeParty API v{}", env!("CARGO_PKG_VERSION"));

    let state = match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;
            let pool = create_pool(database_url, config.database_max_connections).await?;
            let store = Arc::new(PgStore::new(pool));
            build_state(config.clone(), store.clone(), store)
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; ratings are lost on restart");
            let store = Arc::new(MemoryStore::new());
            build_state(config.clone(), store.clone(), store)
        }
    };

    info!(
        "Pairing ids 1..={} with {} minute sessions",
        config.last_pokemon_id,
        config.session_ttl.num_minutes()
    );

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(&config.cors_origins)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_state<S>(config: Config, ratings: Arc<S>, sessions: Arc<S>) -> AppState
where
    S: store::RatingStore + store::SessionStore + 'static,
{
    AppState::new(
        config,
        ratings,
        sessions,
        Arc::new(ThreadRngSampler),
        Arc::new(SystemClock),
    )
}

/// CORS restricted to the configured frontend origins.
fn build_cors(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin '{o}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}
