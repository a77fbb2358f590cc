//! UseCase: 評価送信と評判の再集計
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SubmitRatingUseCase::execute()
//! - 前提条件（注文の状態、評価者の立場、重複）ごとに異なるエラーが返ること
//! - 評価の保存と集計の全件再計算が 1 トランザクションで行われること
//! - rating_submitted / aggregate_updated の配送と、低評価アラートの admin_broadcast 配送
//!
//! ### なぜこのテストが必要か
//! - (注文, 評価者) ごとに評価は 1 件という不変条件を保証する
//! - 平均値が常に全評価の平均と一致することを確認する
//!
//! ### どのような状況を想定しているか
//! - 正常系：顧客がドライバーを評価
//! - 異常系：配達前の注文、無関係なユーザー、重複評価、範囲外のスコア
//! - エッジケース：同時に同じ評価を送信、しきい値を跨ぐ評価

use std::sync::Arc;

use haiso_shared::time::Clock;

use crate::domain::{
    AggregateScore, AggregateUpdatedPayload, EventPayload, Order, OrderId, OrderRepository,
    Principal, Rating, RatingRepository, RatingSubmittedPayload, RepositoryError,
    ReputationPolicy, RoomKey, Score, Timestamp, UserId, can_rate,
};

use super::{dispatch_event::DispatchEventUseCase, error::RatingError};

const MAX_COMMENT_CHARS: usize = 1000;

/// 評価送信コマンド（評価者は認証済みプリンシパル）
#[derive(Debug, Clone)]
pub struct SubmitRatingCommand {
    pub order_id: OrderId,
    pub rater: Principal,
    pub rated_party_id: UserId,
    pub score: i64,
    pub comment: Option<String>,
}

/// 評価送信の結果
#[derive(Debug, Clone, PartialEq)]
pub struct RatingReceipt {
    pub rating: Rating,
    pub aggregate: AggregateScore,
    /// admin_broadcast に低評価アラートを送ったか
    pub admin_alerted: bool,
}

/// 評価送信のユースケース
pub struct SubmitRatingUseCase {
    orders: Arc<dyn OrderRepository>,
    ratings: Arc<dyn RatingRepository>,
    dispatcher: Arc<DispatchEventUseCase>,
    policy: ReputationPolicy,
    clock: Arc<dyn Clock>,
}

impl SubmitRatingUseCase {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        ratings: Arc<dyn RatingRepository>,
        dispatcher: Arc<DispatchEventUseCase>,
        policy: ReputationPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders,
            ratings,
            dispatcher,
            policy,
            clock,
        }
    }

    /// 評価を保存し、評価された側の集計を再計算して配信する
    ///
    /// # Returns
    ///
    /// * `Ok(RatingReceipt)` - 保存された評価と新しい集計
    /// * `Err(RatingError::InvalidRating)` - スコアまたはコメントが不正
    /// * `Err(RatingError::OrderNotEligible)` - 注文が存在しない、または配達済み / 完了でない
    /// * `Err(RatingError::Forbidden)` - 評価者がこの組み合わせで評価できる当事者でない
    /// * `Err(RatingError::DuplicateRating)` - この注文を既に評価している
    pub async fn execute(&self, command: SubmitRatingCommand) -> Result<RatingReceipt, RatingError> {
        let SubmitRatingCommand {
            order_id,
            rater,
            rated_party_id,
            score,
            comment,
        } = command;

        let score = u8::try_from(score)
            .ok()
            .and_then(|s| Score::new(s).ok())
            .ok_or_else(|| {
                RatingError::InvalidRating(format!(
                    "score must be an integer between {} and {}",
                    Score::MIN,
                    Score::MAX
                ))
            })?;
        let comment = normalize_comment(comment)?;

        // 1. 注文の状態
        let order = self
            .orders
            .get_order(&order_id)
            .await
            .map_err(RatingError::Repository)?
            .filter(|o| o.status.accepts_ratings())
            .ok_or_else(|| RatingError::OrderNotEligible(order_id.clone()))?;

        // 2. 評価者と評価される側の立場
        self.authorize(&order, &rater, &rated_party_id)?;

        // 3. 重複（事前チェック。最終的な保証は一意制約）
        if self
            .ratings
            .find_rating(&order_id, &rater.user_id)
            .await
            .map_err(RatingError::Repository)?
            .is_some()
        {
            return Err(duplicate(&order_id, &rater.user_id));
        }

        // 4. 保存 + 全件再集計（単一トランザクション）
        let rating = Rating {
            order_id: order_id.clone(),
            rater_id: rater.user_id.clone(),
            rated_party_id: rated_party_id.clone(),
            score,
            comment,
            created_at: Timestamp::new(self.clock.now_millis()),
        };
        let (previous, aggregate) = self.persist(rating.clone()).await?;

        tracing::info!(
            "Rating {} for order '{}' from '{}' to '{}'; average {:.2} over {}",
            score.value(),
            order_id,
            rater.user_id,
            rated_party_id,
            aggregate.average,
            aggregate.count
        );

        // 5. コミット後に配信
        let admin_alerted = order.is_assigned_to(&rated_party_id)
            && self
                .policy
                .crosses(previous.map(|p| p.average), aggregate.average);
        self.publish(&rating, &aggregate, admin_alerted).await;

        Ok(RatingReceipt {
            rating,
            aggregate,
            admin_alerted,
        })
    }

    fn authorize(
        &self,
        order: &Order,
        rater: &Principal,
        rated_party_id: &UserId,
    ) -> Result<(), RatingError> {
        if &rater.user_id == rated_party_id {
            return Err(RatingError::Forbidden("cannot rate yourself".to_string()));
        }
        let rater_party = order.party_of(&rater.user_id).ok_or_else(|| {
            RatingError::Forbidden(format!("'{}' is not a party of this order", rater.user_id))
        })?;
        let rated_party = order.party_of(rated_party_id).ok_or_else(|| {
            RatingError::Forbidden(format!("'{}' is not a party of this order", rated_party_id))
        })?;

        if !can_rate(rater_party, rated_party) {
            return Err(RatingError::Forbidden(format!(
                "{:?} cannot rate {:?}",
                rater_party, rated_party
            )));
        }
        Ok(())
    }

    async fn persist(
        &self,
        rating: Rating,
    ) -> Result<(Option<AggregateScore>, AggregateScore), RatingError> {
        let order_id = rating.order_id.clone();
        let rater_id = rating.rater_id.clone();
        let rated_party_id = rating.rated_party_id.clone();

        let mut tx = self.ratings.begin().await.map_err(RatingError::Repository)?;
        let previous = tx
            .aggregate_for(&rated_party_id)
            .await
            .map_err(RatingError::Repository)?;
        tx.insert_rating(rating).await.map_err(|e| match e {
            RepositoryError::UniqueViolation(_) => duplicate(&order_id, &rater_id),
            other => RatingError::Repository(other),
        })?;
        let aggregate = tx
            .recompute_aggregate(&rated_party_id)
            .await
            .map_err(RatingError::Repository)?;
        tx.commit().await.map_err(RatingError::Repository)?;

        Ok((previous, aggregate))
    }

    async fn publish(&self, rating: &Rating, aggregate: &AggregateScore, admin_alerted: bool) {
        let personal = RoomKey::User(rating.rated_party_id.clone());
        let submitted = EventPayload::RatingSubmitted(RatingSubmittedPayload {
            order_id: rating.order_id.clone(),
            rated_party_id: rating.rated_party_id.clone(),
            score: rating.score,
        });
        let updated = EventPayload::AggregateUpdated(AggregateUpdatedPayload {
            rated_party_id: aggregate.rated_party_id.clone(),
            average: aggregate.average,
            count: aggregate.count,
        });

        let mut deliveries = vec![
            (personal.clone(), submitted),
            (personal, updated.clone()),
        ];
        if admin_alerted {
            tracing::warn!(
                "Driver '{}' fell below the low-reputation threshold ({:.2} < {:.2})",
                aggregate.rated_party_id,
                aggregate.average,
                self.policy.low_reputation_threshold
            );
            deliveries.push((RoomKey::AdminBroadcast, updated));
        }

        for (room, payload) in deliveries {
            if let Err(e) = self.dispatcher.dispatch_system_to(room.clone(), payload).await {
                tracing::error!("Failed to publish rating event to '{}': {}", room, e);
            }
        }
    }
}

fn normalize_comment(comment: Option<String>) -> Result<Option<String>, RatingError> {
    let Some(comment) = comment else {
        return Ok(None);
    };
    let trimmed = comment.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_COMMENT_CHARS {
        return Err(RatingError::InvalidRating(format!(
            "comment must be at most {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

fn duplicate(order_id: &OrderId, rater_id: &UserId) -> RatingError {
    RatingError::DuplicateRating {
        order_id: order_id.to_string(),
        rater_id: rater_id.to_string(),
    }
}
