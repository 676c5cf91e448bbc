use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::models::popularity::{ComparisonSession, RatingRecord};
use crate::store::{RatingOrder, RatingStore, SessionStore, StoreError};

/// PostgreSQL-backed store. Relies on the `UNIQUE (entity_id)` index of
/// `popularity_leaderboard` for lazy-creation races.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_insert_error(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict(what())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl RatingStore for PgStore {
    async fn get_rating(&self, entity_id: i32) -> Result<Option<RatingRecord>, StoreError> {
        Ok(sqlx::query_as::<_, RatingRecord>(
            "SELECT entity_id, rating FROM popularity_leaderboard WHERE entity_id = $1",
        )
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_rating(&self, record: &RatingRecord) -> Result<RatingRecord, StoreError> {
        let created = sqlx::query_as::<_, RatingRecord>(
            r#"
            INSERT INTO popularity_leaderboard (entity_id, rating)
            VALUES ($1, $2)
            RETURNING entity_id, rating
            "#,
        )
        .bind(record.entity_id)
        .bind(record.rating)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, || format!("rating for entity {}", record.entity_id)))?;

        debug!("Created rating record for entity {}", created.entity_id);
        Ok(created)
    }

    async fn update_rating(&self, entity_id: i32, rating: i32) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE popularity_leaderboard SET rating = $1 WHERE entity_id = $2")
                .bind(rating)
                .bind(entity_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Internal(format!(
                "no rating record for entity {entity_id}"
            )));
        }
        Ok(())
    }

    async fn list_ratings(
        &self,
        order: RatingOrder,
        limit: Option<i64>,
    ) -> Result<Vec<RatingRecord>, StoreError> {
        let order_by = match order {
            RatingOrder::RatingDesc => "rating DESC, entity_id ASC",
            RatingOrder::EntityIdAsc => "entity_id ASC",
        };
        // LIMIT NULL means no limit in PostgreSQL.
        let sql = format!(
            "SELECT entity_id, rating FROM popularity_leaderboard ORDER BY {order_by} LIMIT $1"
        );
        Ok(sqlx::query_as::<_, RatingRecord>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, session: &ComparisonSession) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO comparison_sessions
                (session_id, entity_a_id, entity_b_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&session.session_id)
        .bind(session.entity_a_id)
        .bind(session.entity_b_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, || format!("session {}", session.session_id)))?;
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<ComparisonSession>, StoreError> {
        Ok(sqlx::query_as::<_, ComparisonSession>(
            r#"
            SELECT session_id, entity_a_id, entity_b_id, created_at, expires_at
            FROM comparison_sessions
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM comparison_sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
