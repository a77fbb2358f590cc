//! Entities
//!
//! 接続（Connection）、注文（Order）、評価（Rating）、集計スコア（AggregateScore）を定義します。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::value_object::{ConnectionId, OrderId, Principal, RoomKey, Score, Timestamp, UserId};

/// Lifecycle state of a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// 接続エンティティ
///
/// Connection Registry が唯一の所有者。永続化されず、再接続のたびに
/// クライアントのサブスクリプション再送によって再構築される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub principal: Principal,
    pub rooms: BTreeSet<RoomKey>,
    pub connected_at: Timestamp,
    pub last_heartbeat: Timestamp,
    pub state: ConnectionState,
}

impl Connection {
    pub fn new(id: ConnectionId, principal: Principal, connected_at: Timestamp) -> Self {
        Self {
            id,
            principal,
            rooms: BTreeSet::new(),
            connected_at,
            last_heartbeat: connected_at,
            state: ConnectionState::Connecting,
        }
    }

    pub fn is_member_of(&self, room: &RoomKey) -> bool {
        self.rooms.contains(room)
    }

    /// 最後の通信から `max_silence_millis` 以上経過しているか
    pub fn is_silent_since(&self, now: Timestamp, max_silence_millis: i64) -> bool {
        self.last_heartbeat.millis_until(now) >= max_silence_millis
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Preparing,
    ReadyForPickup,
    PickedUp,
    InTransit,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }

    /// 評価を受け付けられる状態か（配達済み / 完了）
    pub fn accepts_ratings(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Completed)
    }
}

/// The side a user takes on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderParty {
    Customer,
    Merchant,
    Driver,
}

/// 注文レコード（CRUD 層から取得する外部データ）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub merchant_id: UserId,
    pub driver_id: Option<UserId>,
    pub status: OrderStatus,
}

impl Order {
    /// `user_id` がこの注文のどの当事者か
    ///
    /// 同一ユーザーが複数の立場を持つ場合は customer → merchant → driver の順で判定する。
    pub fn party_of(&self, user_id: &UserId) -> Option<OrderParty> {
        if &self.customer_id == user_id {
            Some(OrderParty::Customer)
        } else if &self.merchant_id == user_id {
            Some(OrderParty::Merchant)
        } else if self.driver_id.as_ref() == Some(user_id) {
            Some(OrderParty::Driver)
        } else {
            None
        }
    }

    pub fn is_party(&self, user_id: &UserId) -> bool {
        self.party_of(user_id).is_some()
    }

    pub fn is_assigned_to(&self, driver_id: &UserId) -> bool {
        self.driver_id.as_ref() == Some(driver_id)
    }
}

/// 永続化される評価レコード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rating {
    pub order_id: OrderId,
    pub rater_id: UserId,
    pub rated_party_id: UserId,
    pub score: Score,
    pub comment: Option<String>,
    pub created_at: Timestamp,
}

/// Average and count of every rating a party has received.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateScore {
    pub rated_party_id: UserId,
    pub average: f64,
    pub count: u64,
}

impl AggregateScore {
    /// 全評価から集計を再計算する（差分更新はしない）
    pub fn recompute<'a>(
        rated_party_id: UserId,
        scores: impl IntoIterator<Item = &'a Score>,
    ) -> Self {
        let (sum, count) = scores
            .into_iter()
            .fold((0u64, 0u64), |(sum, count), score| {
                (sum + u64::from(score.value()), count + 1)
            });
        let average = if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        };

        Self {
            rated_party_id,
            average,
            count,
        }
    }
}
