use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Rating every entity starts from on its first comparison.
pub const INITIAL_RATING: i32 = 1000;

/// One row of the popularity leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RatingRecord {
    pub entity_id: i32,
    pub rating: i32,
}

impl RatingRecord {
    pub fn new(entity_id: i32) -> Self {
        Self {
            entity_id,
            rating: INITIAL_RATING,
        }
    }
}

/// A pending, single-use comparison between two entities.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ComparisonSession {
    pub session_id: String,
    pub entity_a_id: i32,
    pub entity_b_id: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ComparisonSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn contains(&self, entity_id: i32) -> bool {
        self.entity_a_id == entity_id || self.entity_b_id == entity_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairResult {
    pub entity_a_id: i32,
    pub entity_b_id: i32,
    pub session_id: String,
}

impl From<&ComparisonSession> for PairResult {
    fn from(session: &ComparisonSession) -> Self {
        Self {
            entity_a_id: session.entity_a_id,
            entity_b_id: session.entity_b_id,
            session_id: session.session_id.clone(),
        }
    }
}
