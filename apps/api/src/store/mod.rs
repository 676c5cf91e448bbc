//! Persistence seam for the popularity subsystem.
//!
//! The rating engine and the pairing manager only talk to these traits.
//! `PgStore` is the production backend, `MemoryStore` backs local runs without
//! a database and the test-suite. `AppState` carries both as `Arc<dyn …>`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::popularity::{ComparisonSession, RatingRecord};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("already exists: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store error: {0}")]
    Internal(String),
}

/// Sort order for leaderboard listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingOrder {
    /// Highest rating first, ties broken by entity id.
    RatingDesc,
    EntityIdAsc,
}

#[async_trait]
pub trait RatingStore: Send + Sync {
    async fn get_rating(&self, entity_id: i32) -> Result<Option<RatingRecord>, StoreError>;

    /// Inserts a new record. Fails with `StoreError::Conflict` if the entity
    /// already has one.
    async fn create_rating(&self, record: &RatingRecord) -> Result<RatingRecord, StoreError>;

    async fn update_rating(&self, entity_id: i32, rating: i32) -> Result<(), StoreError>;

    async fn list_ratings(
        &self,
        order: RatingOrder,
        limit: Option<i64>,
    ) -> Result<Vec<RatingRecord>, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &ComparisonSession) -> Result<(), StoreError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<ComparisonSession>, StoreError>;

    /// Atomically removes the session. Returns `true` only for the caller that
    /// actually removed it.
    async fn delete_session(&self, session_id: &str) -> Result<bool, StoreError>;
}
