//! Pairing sessions: hand out two distinct random entities, then accept exactly
//! one vote for that pair before the session expires.

use std::sync::Arc;

use chrono::Duration;
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::popularity::{ComparisonSession, PairResult};
use crate::popularity::clock::Clock;
use crate::popularity::elo::RatingEngine;
use crate::store::SessionStore;

/// Uniform draw of an entity id from an inclusive range.
pub trait IdSampler: Send + Sync {
    fn sample(&self, min_id: i32, max_id: i32) -> i32;
}

pub struct ThreadRngSampler;

impl IdSampler for ThreadRngSampler {
    fn sample(&self, min_id: i32, max_id: i32) -> i32 {
        rand::thread_rng().gen_range(min_id..=max_id)
    }
}

#[derive(Clone)]
pub struct PairingManager {
    sessions: Arc<dyn SessionStore>,
    engine: RatingEngine,
    sampler: Arc<dyn IdSampler>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl PairingManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        engine: RatingEngine,
        sampler: Arc<dyn IdSampler>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            sessions,
            engine,
            sampler,
            clock,
            ttl,
        }
    }

    /// Opens a session for two distinct entities drawn from `[min_id, max_id]`.
    pub async fn create_pair(&self, min_id: i32, max_id: i32) -> Result<PairResult, AppError> {
        if max_id <= min_id {
            return Err(AppError::Validation(format!(
                "id range [{min_id}, {max_id}] must hold at least two entities"
            )));
        }

        let entity_a_id = self.sampler.sample(min_id, max_id);
        let mut entity_b_id = self.sampler.sample(min_id, max_id);
        while entity_b_id == entity_a_id {
            entity_b_id = self.sampler.sample(min_id, max_id);
        }

        let created_at = self.clock.now();
        let session = ComparisonSession {
            session_id: Uuid::new_v4().to_string(),
            entity_a_id,
            entity_b_id,
            created_at,
            expires_at: created_at + self.ttl,
        };
        self.sessions.create_session(&session).await?;

        debug!(
            "Opened session {} for {entity_a_id} vs {entity_b_id}, expires {}",
            session.session_id, session.expires_at
        );
        Ok(PairResult::from(&session))
    }

    /// Resolves a session with a vote for `winner_id`.
    ///
    /// Unknown or already-consumed sessions fail with `NotFound`. Expired
    /// sessions are deleted and fail with `Expired`. A winner outside the pair
    /// fails with `Validation` and leaves the session open for another try.
    pub async fn resolve_vote(&self, session_id: &str, winner_id: i32) -> Result<PairResult, AppError> {
        let session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;

        if session.is_expired_at(self.clock.now()) {
            self.sessions.delete_session(session_id).await?;
            info!("Session {session_id} expired at {}", session.expires_at);
            return Err(AppError::Expired(format!("Session {session_id} has expired")));
        }

        if !session.contains(winner_id) {
            return Err(AppError::Validation(format!(
                "winner {winner_id} is not part of session {session_id}"
            )));
        }

        // Only the request that removes the row gets to apply the vote.
        if !self.sessions.delete_session(session_id).await? {
            return Err(AppError::NotFound(format!("Session {session_id} not found")));
        }

        self.engine
            .apply_result(session.entity_a_id, session.entity_b_id, winner_id)
            .await?;

        info!("Session {session_id} resolved, winner {winner_id}");
        Ok(PairResult::from(&session))
    }
}
