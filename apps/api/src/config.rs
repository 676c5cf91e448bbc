use anyhow::{bail, Context, Result};
use chrono::Duration;

/// Longest comparison session the service will hand out (one week).
const MAX_SESSION_TTL_MINUTES: i64 = 7 * 24 * 60;

/// Which persistence backend the popularity store runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Application configuration loaded from environment variables.
/// Startup fails if `DATABASE_URL` is missing while the Postgres backend is selected.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub port: u16,
    pub rust_log: String,
    /// Highest Pokédex number handed out by the pair sampler.
    pub last_pokemon_id: i32,
    pub session_ttl: Duration,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store_backend = match optional_env("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        };

        let database_url = match store_backend {
            StoreBackend::Postgres => Some(require_env("DATABASE_URL")?),
            StoreBackend::Memory => optional_env("DATABASE_URL"),
        };

        let config = Config {
            store_backend,
            database_url,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            last_pokemon_id: parse_env("LAST_POKEMON_ID", 1025)?,
            session_ttl: session_ttl_from_minutes(parse_env("SESSION_TTL_MINUTES", 10)?)?,
            cors_origins: optional_env("CORS_ORIGINS")
                .map(|raw| split_origins(&raw))
                .unwrap_or_else(default_cors_origins),
        };

        if config.last_pokemon_id < 2 {
            bail!("LAST_POKEMON_ID must be at least 2 to form a pair");
        }

        Ok(config)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}

fn session_ttl_from_minutes(minutes: i64) -> Result<Duration> {
    if !(1..=MAX_SESSION_TTL_MINUTES).contains(&minutes) {
        bail!("SESSION_TTL_MINUTES must be between 1 and {MAX_SESSION_TTL_MINUTES}, got {minutes}");
    }
    Duration::try_minutes(minutes)
        .with_context(|| format!("SESSION_TTL_MINUTES is out of range: {minutes}"))
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "https://pokeparty.ressca.dev".to_string(),
    ]
}
