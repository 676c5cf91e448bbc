//! Elo rating engine for the popularity leaderboard.
//!
//! Ratings are integers. Every update is truncated toward zero after applying
//! `K_FACTOR * (actual - expected)`, so the two ratings of a comparison can
//! drift by one point from a strict zero-sum transfer.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::popularity::{RatingRecord, INITIAL_RATING};
use crate::store::{RatingOrder, RatingStore, StoreError};

pub const K_FACTOR: f64 = 48.0;

/// Highest rating the seed endpoint accepts.
pub const MAX_SEED_RATING: i32 = 10_000;

/// Expected score of a player rated `own` against one rated `opponent`.
pub fn expected_score(own: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((f64::from(opponent) - f64::from(own)) / 400.0))
}

/// `old + K * (actual - expected)`, truncated toward zero. Saturates at the
/// `i32` bounds.
pub fn updated_rating(old: i32, actual: f64, expected: f64) -> i32 {
    (f64::from(old) + K_FACTOR * (actual - expected)).trunc() as i32
}

/// New ratings for both sides of a single comparison.
pub fn compute_update(rating_a: i32, rating_b: i32, a_won: bool) -> (i32, i32) {
    let expected_a = expected_score(rating_a, rating_b);
    let expected_b = expected_score(rating_b, rating_a);
    let (actual_a, actual_b) = if a_won { (1.0, 0.0) } else { (0.0, 1.0) };
    (
        updated_rating(rating_a, actual_a, expected_a),
        updated_rating(rating_b, actual_b, expected_b),
    )
}

#[derive(Clone)]
pub struct RatingEngine {
    store: Arc<dyn RatingStore>,
}

impl RatingEngine {
    pub fn new(store: Arc<dyn RatingStore>) -> Self {
        Self { store }
    }

    /// Records that `winner_id` beat the other member of the pair and returns
    /// the new ratings of `entity_a_id` and `entity_b_id`, in that order.
    pub async fn apply_result(
        &self,
        entity_a_id: i32,
        entity_b_id: i32,
        winner_id: i32,
    ) -> Result<(i32, i32), AppError> {
        if entity_a_id == entity_b_id {
            return Err(AppError::Validation(format!(
                "cannot compare entity {entity_a_id} with itself"
            )));
        }
        if winner_id != entity_a_id && winner_id != entity_b_id {
            return Err(AppError::Validation(format!(
                "winner {winner_id} is not one of {entity_a_id} and {entity_b_id}"
            )));
        }

        let record_a = self.get_or_create(entity_a_id).await?;
        let record_b = self.get_or_create(entity_b_id).await?;

        let (new_a, new_b) =
            compute_update(record_a.rating, record_b.rating, winner_id == entity_a_id);

        self.store.update_rating(entity_a_id, new_a).await?;
        self.store.update_rating(entity_b_id, new_b).await?;

        info!(
            "Rated {entity_a_id} vs {entity_b_id} (winner {winner_id}): {} -> {new_a}, {} -> {new_b}",
            record_a.rating, record_b.rating
        );
        Ok((new_a, new_b))
    }

    /// Returns the entity's record, creating it at the initial rating if it
    /// has none yet. A concurrent creator winning the insert is resolved by a
    /// single re-read.
    pub async fn get_or_create(&self, entity_id: i32) -> Result<RatingRecord, AppError> {
        if let Some(record) = self.store.get_rating(entity_id).await? {
            return Ok(record);
        }

        match self.store.create_rating(&RatingRecord::new(entity_id)).await {
            Ok(record) => Ok(record),
            Err(StoreError::Conflict(_)) => {
                debug!("Rating for entity {entity_id} created concurrently, re-reading");
                self.store.get_rating(entity_id).await?.ok_or_else(|| {
                    AppError::Internal(anyhow!(
                        "rating for entity {entity_id} conflicted on insert but is missing on re-read"
                    ))
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn rating_of(&self, entity_id: i32) -> Result<RatingRecord, AppError> {
        self.store
            .get_rating(entity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No rating for entity {entity_id}")))
    }

    pub async fn top(&self, n: u32) -> Result<Vec<RatingRecord>, AppError> {
        Ok(self
            .store
            .list_ratings(RatingOrder::RatingDesc, Some(i64::from(n)))
            .await?)
    }

    pub async fn all(&self) -> Result<Vec<RatingRecord>, AppError> {
        Ok(self
            .store
            .list_ratings(RatingOrder::EntityIdAsc, None)
            .await?)
    }

    /// Inserts a record with an explicit rating. Unlike lazy creation, an
    /// existing record is reported as a conflict.
    pub async fn seed(&self, entity_id: i32, rating: Option<i32>) -> Result<RatingRecord, AppError> {
        let rating = rating.unwrap_or(INITIAL_RATING);
        if !(0..=MAX_SEED_RATING).contains(&rating) {
            return Err(AppError::Validation(format!(
                "rating must be between 0 and {MAX_SEED_RATING}, got {rating}"
            )));
        }
        let record = self
            .store
            .create_rating(&RatingRecord { entity_id, rating })
            .await?;
        info!("Seeded rating {rating} for entity {entity_id}");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn engine_with(store: Arc<MemoryStore>) -> RatingEngine {
        RatingEngine::new(store)
    }

    async fn seed(store: &MemoryStore, entity_id: i32, rating: i32) {
        store
            .create_rating(&RatingRecord { entity_id, rating })
            .await
            .unwrap();
    }

    #[test]
    fn test_expected_scores_sum_to_one() {
        let sum = expected_score(1234, 987) + expected_score(987, 1234);
        assert!((sum - 1.0).abs() < 1e-12, "Sum was {sum}");
    }

    #[test]
    fn test_equal_ratings_move_by_half_k() {
        assert_eq!(compute_update(1000, 1000, true), (1024, 976));
        assert_eq!(compute_update(1000, 1000, false), (976, 1024));
    }

    #[test]
    fn test_truncation_is_toward_zero() {
        // 1000 + 48 * (1 - 0.9) = 1004.8, kept as 1004
        assert_eq!(updated_rating(1000, 1.0, 0.9), 1004);
        // 1000 + 48 * (0 - 0.1) = 995.2, kept as 995
        assert_eq!(updated_rating(1000, 0.0, 0.1), 995);
        // -10 + 48 * (0 - 0.05) = -12.4, kept as -12
        assert_eq!(updated_rating(-10, 0.0, 0.05), -12);
    }

    #[test]
    fn test_favorite_gains_little() {
        let (favorite, _) = compute_update(1400, 600, true);
        let gain = favorite - 1400;
        assert!((0..3).contains(&gain), "Gain was {gain}");
    }

    #[test]
    fn test_underdog_upset_gains_a_lot() {
        let (_, underdog) = compute_update(1400, 600, false);
        assert!(underdog - 600 > 30, "Underdog ended at {underdog}");
    }

    #[test]
    fn test_extreme_rating_gap_does_not_overflow() {
        let (low, high) = compute_update(-24, i32::MAX, false);
        assert_eq!(low, -24);
        assert_eq!(high, i32::MAX);

        let (low, high) = compute_update(i32::MIN, i32::MAX, true);
        assert!(low > i32::MIN);
        assert!(high < i32::MAX);
        assert!(expected_score(i32::MIN, i32::MAX).is_finite());
    }

    #[test]
    fn test_transfer_is_near_zero_sum() {
        for (a, b, a_won) in [(1200, 800, false), (1013, 1500, true), (1000, 1000, true)] {
            let (new_a, new_b) = compute_update(a, b, a_won);
            let drift = (new_a + new_b) - (a + b);
            assert!(drift.abs() <= 1, "Drift was {drift} for {a} vs {b}");
        }
    }

    #[tokio::test]
    async fn test_apply_result_creates_missing_entities() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(store.clone());

        let (a, b) = engine.apply_result(2100, 2101, 2100).await.unwrap();
        assert_eq!((a, b), (1024, 976));

        assert_eq!(store.get_rating(2100).await.unwrap().unwrap().rating, 1024);
        assert_eq!(store.get_rating(2101).await.unwrap().unwrap().rating, 976);
    }

    #[tokio::test]
    async fn test_apply_result_second_entity_wins() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 2003, 1200).await;
        seed(&store, 2004, 800).await;
        let engine = engine_with(store.clone());

        let (a, b) = engine.apply_result(2003, 2004, 2004).await.unwrap();
        assert!(a < 1200);
        assert!(b > 800);
        assert_eq!(store.get_rating(2003).await.unwrap().unwrap().rating, a);
    }

    #[tokio::test]
    async fn test_apply_result_rejects_outside_winner_without_writes() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(store.clone());

        let err = engine.apply_result(1, 2, 3).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let all = store.list_ratings(RatingOrder::EntityIdAsc, None).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_apply_result_rejects_identical_pair() {
        let engine = engine_with(Arc::new(MemoryStore::new()));
        let err = engine.apply_result(5, 5, 5).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lazy_init_yields_initial_rating() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(store.clone());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.get_or_create(42).await })
            })
            .collect();

        for handle in handles {
            let record = handle.await.unwrap().unwrap();
            assert_eq!(record.rating, INITIAL_RATING);
        }
        let all = store.list_ratings(RatingOrder::EntityIdAsc, None).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    /// Hides the record from the first read, the way a request that lost the
    /// insert race sees the table.
    struct LateReader {
        inner: MemoryStore,
        hide_once: AtomicBool,
        visible_on_reread: bool,
    }

    #[async_trait]
    impl RatingStore for LateReader {
        async fn get_rating(&self, entity_id: i32) -> Result<Option<RatingRecord>, StoreError> {
            if self.hide_once.swap(false, Ordering::SeqCst) || !self.visible_on_reread {
                return Ok(None);
            }
            self.inner.get_rating(entity_id).await
        }

        async fn create_rating(&self, record: &RatingRecord) -> Result<RatingRecord, StoreError> {
            self.inner.create_rating(record).await
        }

        async fn update_rating(&self, entity_id: i32, rating: i32) -> Result<(), StoreError> {
            self.inner.update_rating(entity_id, rating).await
        }

        async fn list_ratings(
            &self,
            order: RatingOrder,
            limit: Option<i64>,
        ) -> Result<Vec<RatingRecord>, StoreError> {
            self.inner.list_ratings(order, limit).await
        }
    }

    async fn late_reader(visible_on_reread: bool) -> LateReader {
        let inner = MemoryStore::new();
        seed(&inner, 7, 1111).await;
        LateReader {
            inner,
            hide_once: AtomicBool::new(true),
            visible_on_reread,
        }
    }

    #[tokio::test]
    async fn test_conflict_on_create_falls_back_to_existing_record() {
        let engine = RatingEngine::new(Arc::new(late_reader(true).await));

        let record = engine.get_or_create(7).await.unwrap();
        assert_eq!(record.rating, 1111);
    }

    #[tokio::test]
    async fn test_conflict_retry_is_bounded() {
        let engine = RatingEngine::new(Arc::new(late_reader(false).await));

        let err = engine.get_or_create(7).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_seed_conflicts_on_existing_entity() {
        let engine = engine_with(Arc::new(MemoryStore::new()));
        engine.seed(9, Some(1234)).await.unwrap();

        let err = engine.seed(9, None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(engine.rating_of(9).await.unwrap().rating, 1234);
    }

    #[tokio::test]
    async fn test_seed_rejects_out_of_range_ratings() {
        let engine = engine_with(Arc::new(MemoryStore::new()));
        for rating in [-1, MAX_SEED_RATING + 1, i32::MAX] {
            let err = engine.seed(3, Some(rating)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "rating {rating}");
        }
        let record = engine.seed(3, Some(MAX_SEED_RATING)).await.unwrap();
        assert_eq!(record.rating, MAX_SEED_RATING);
    }

    #[tokio::test]
    async fn test_vote_against_stored_extreme_rating() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 1, 0).await;
        seed(&store, 2, 0).await;
        seed(&store, 3, i32::MAX).await;
        let engine = engine_with(store.clone());

        assert_eq!(engine.apply_result(1, 2, 2).await.unwrap(), (-24, 24));
        let (low, high) = engine.apply_result(1, 3, 3).await.unwrap();
        assert_eq!((low, high), (-24, i32::MAX));
        assert_eq!(store.get_rating(3).await.unwrap().unwrap().rating, i32::MAX);
    }

    #[tokio::test]
    async fn test_rating_of_unknown_entity_is_not_found() {
        let engine = engine_with(Arc::new(MemoryStore::new()));
        assert!(matches!(
            engine.rating_of(9999).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
