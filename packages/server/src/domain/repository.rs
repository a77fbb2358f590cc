//! Repository trait 定義
//!
//! 注文レコードと評価ストアへのインターフェース。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{
    entity::{AggregateScore, Order, OrderStatus, Rating},
    error::RepositoryError,
    value_object::{OrderId, UserId},
};

/// Order Repository trait
///
/// CRUD 層が持つ注文レコードの読み取り口。購読認可と評価の前提条件チェックに使う。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// ドライバーに割り当てられている注文の一覧
    async fn orders_for_driver(&self, driver_id: &UserId) -> Result<Vec<Order>, RepositoryError>;

    async fn save_order(&self, order: Order) -> Result<(), RepositoryError>;

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError>;
}

/// Rating store.
///
/// `(order_id, rater_id)` の一意制約はトランザクション内の `insert_rating` が保証する。
#[async_trait]
pub trait RatingRepository: Send + Sync {
    async fn find_rating(
        &self,
        order_id: &OrderId,
        rater_id: &UserId,
    ) -> Result<Option<Rating>, RepositoryError>;

    async fn aggregate_for(
        &self,
        rated_party_id: &UserId,
    ) -> Result<Option<AggregateScore>, RepositoryError>;

    /// Open a transaction. Raters of the same store are serialized until
    /// the transaction commits or is dropped.
    async fn begin(&self) -> Result<Box<dyn RatingTransaction>, RepositoryError>;
}

/// Unit of work for rating insert + aggregate recompute.
///
/// Dropping without `commit` discards staged writes.
#[async_trait]
pub trait RatingTransaction: Send {
    async fn aggregate_for(
        &mut self,
        rated_party_id: &UserId,
    ) -> Result<Option<AggregateScore>, RepositoryError>;

    /// 一意制約違反は `RepositoryError::UniqueViolation`
    async fn insert_rating(&mut self, rating: Rating) -> Result<(), RepositoryError>;

    /// 全評価から集計を再計算して保存する
    async fn recompute_aggregate(
        &mut self,
        rated_party_id: &UserId,
    ) -> Result<AggregateScore, RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}
