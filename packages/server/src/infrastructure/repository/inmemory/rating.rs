//! InMemory Rating Repository 実装
//!
//! 評価テーブルと集計テーブルをひとつの `Mutex` で保護します。
//! トランザクションはロックを所有したまま書き込みをステージし、`commit` で反映します。
//! コミットせずに破棄されたトランザクションの書き込みは捨てられます。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{
    AggregateScore, OrderId, Rating, RatingRepository, RatingTransaction, RepositoryError, UserId,
};

#[derive(Default)]
struct RatingTables {
    /// `(order_id, rater_id)` が一意キー
    ratings: HashMap<(OrderId, UserId), Rating>,
    aggregates: HashMap<UserId, AggregateScore>,
}

/// インメモリ Rating Repository 実装
#[derive(Default)]
pub struct InMemoryRatingRepository {
    tables: Arc<Mutex<RatingTables>>,
}

impl InMemoryRatingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RatingRepository for InMemoryRatingRepository {
    async fn find_rating(
        &self,
        order_id: &OrderId,
        rater_id: &UserId,
    ) -> Result<Option<Rating>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .ratings
            .get(&(order_id.clone(), rater_id.clone()))
            .cloned())
    }

    async fn aggregate_for(
        &self,
        rated_party_id: &UserId,
    ) -> Result<Option<AggregateScore>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.aggregates.get(rated_party_id).cloned())
    }

    async fn begin(&self) -> Result<Box<dyn RatingTransaction>, RepositoryError> {
        let tables = self.tables.clone().lock_owned().await;
        Ok(Box::new(InMemoryRatingTransaction {
            tables,
            staged_ratings: Vec::new(),
            staged_aggregates: HashMap::new(),
        }))
    }
}

struct InMemoryRatingTransaction {
    tables: OwnedMutexGuard<RatingTables>,
    staged_ratings: Vec<Rating>,
    staged_aggregates: HashMap<UserId, AggregateScore>,
}

impl InMemoryRatingTransaction {
    fn exists(&self, order_id: &OrderId, rater_id: &UserId) -> bool {
        self.tables
            .ratings
            .contains_key(&(order_id.clone(), rater_id.clone()))
            || self
                .staged_ratings
                .iter()
                .any(|r| &r.order_id == order_id && &r.rater_id == rater_id)
    }
}

#[async_trait]
impl RatingTransaction for InMemoryRatingTransaction {
    async fn aggregate_for(
        &mut self,
        rated_party_id: &UserId,
    ) -> Result<Option<AggregateScore>, RepositoryError> {
        Ok(self
            .staged_aggregates
            .get(rated_party_id)
            .or_else(|| self.tables.aggregates.get(rated_party_id))
            .cloned())
    }

    async fn insert_rating(&mut self, rating: Rating) -> Result<(), RepositoryError> {
        if self.exists(&rating.order_id, &rating.rater_id) {
            return Err(RepositoryError::UniqueViolation(format!(
                "rating for order '{}' by '{}'",
                rating.order_id, rating.rater_id
            )));
        }
        self.staged_ratings.push(rating);
        Ok(())
    }

    async fn recompute_aggregate(
        &mut self,
        rated_party_id: &UserId,
    ) -> Result<AggregateScore, RepositoryError> {
        let scores = self
            .tables
            .ratings
            .values()
            .chain(self.staged_ratings.iter())
            .filter(|r| &r.rated_party_id == rated_party_id)
            .map(|r| &r.score);
        let aggregate = AggregateScore::recompute(rated_party_id.clone(), scores);

        self.staged_aggregates
            .insert(rated_party_id.clone(), aggregate.clone());
        Ok(aggregate)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let Self {
            mut tables,
            staged_ratings,
            staged_aggregates,
        } = *self;

        for rating in staged_ratings {
            tables
                .ratings
                .insert((rating.order_id.clone(), rating.rater_id.clone()), rating);
        }
        tables.aggregates.extend(staged_aggregates);
        Ok(())
    }
}
