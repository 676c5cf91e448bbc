use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::models::popularity::{ComparisonSession, RatingRecord};
use crate::store::{RatingOrder, RatingStore, SessionStore, StoreError};

/// In-process store. Each map sits behind its own lock, so inserts and
/// removals are atomic with respect to other requests just like the
/// unique index and `DELETE` in Postgres.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ratings: RwLock<HashMap<i32, RatingRecord>>,
    sessions: RwLock<HashMap<String, ComparisonSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<'a, T>(lock: &'a RwLock<T>, name: &str) -> Result<RwLockReadGuard<'a, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::Internal(format!("failed to acquire {name} read lock")))
}

fn write<'a, T>(lock: &'a RwLock<T>, name: &str) -> Result<RwLockWriteGuard<'a, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::Internal(format!("failed to acquire {name} write lock")))
}

#[async_trait]
impl RatingStore for MemoryStore {
    async fn get_rating(&self, entity_id: i32) -> Result<Option<RatingRecord>, StoreError> {
        Ok(read(&self.ratings, "ratings")?.get(&entity_id).cloned())
    }

    async fn create_rating(&self, record: &RatingRecord) -> Result<RatingRecord, StoreError> {
        let mut ratings = write(&self.ratings, "ratings")?;
        if ratings.contains_key(&record.entity_id) {
            return Err(StoreError::Conflict(format!(
                "rating for entity {}",
                record.entity_id
            )));
        }
        ratings.insert(record.entity_id, record.clone());
        Ok(record.clone())
    }

    async fn update_rating(&self, entity_id: i32, rating: i32) -> Result<(), StoreError> {
        let mut ratings = write(&self.ratings, "ratings")?;
        match ratings.get_mut(&entity_id) {
            Some(record) => {
                record.rating = rating;
                Ok(())
            }
            None => Err(StoreError::Internal(format!(
                "no rating record for entity {entity_id}"
            ))),
        }
    }

    async fn list_ratings(
        &self,
        order: RatingOrder,
        limit: Option<i64>,
    ) -> Result<Vec<RatingRecord>, StoreError> {
        let mut records: Vec<RatingRecord> =
            read(&self.ratings, "ratings")?.values().cloned().collect();

        match order {
            RatingOrder::RatingDesc => records.sort_by(|a, b| {
                b.rating
                    .cmp(&a.rating)
                    .then_with(|| a.entity_id.cmp(&b.entity_id))
            }),
            RatingOrder::EntityIdAsc => records.sort_by_key(|r| r.entity_id),
        }

        if let Some(limit) = limit {
            records.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        }
        Ok(records)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: &ComparisonSession) -> Result<(), StoreError> {
        let mut sessions = write(&self.sessions, "sessions")?;
        if sessions.contains_key(&session.session_id) {
            return Err(StoreError::Conflict(format!(
                "session {}",
                session.session_id
            )));
        }
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<ComparisonSession>, StoreError> {
        Ok(read(&self.sessions, "sessions")?.get(session_id).cloned())
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(write(&self.sessions, "sessions")?
            .remove(session_id)
            .is_some())
    }
}
