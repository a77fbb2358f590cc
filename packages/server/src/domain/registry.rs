//! Connection Registry / Room Router trait 定義
//!
//! 接続の登録簿とルームへのファンアウトのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use super::{
    entity::{Connection, ConnectionState},
    event::Event,
    value_object::{ConnectionId, Principal, RoomKey, Timestamp, UserId},
};

/// Bounded outbound queue feeding one connection's write loop.
pub type OutboundChannel = mpsc::Sender<String>;

/// Transport-side handles the registry keeps for a live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// 送信キュー（pusher loop が受信側を持つ）
    pub outbound: OutboundChannel,
    /// `true` を送ると接続タスク群が終了する
    pub close: watch::Sender<bool>,
}

impl ConnectionHandle {
    pub fn new(outbound: OutboundChannel, close: watch::Sender<bool>) -> Self {
        Self { outbound, close }
    }
}

/// Connection Registry trait
///
/// 接続ごとのプリンシパル、購読ルーム、最終通信時刻を保持する唯一の所有者。
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// 新しい接続を登録し、サーバー生成の ID を割り当てる
    async fn admit(
        &self,
        principal: Principal,
        handle: ConnectionHandle,
        now: Timestamp,
    ) -> Connection;

    /// 接続を削除し、接続タスクに終了を通知する
    ///
    /// 冪等。既に削除済みなら `None` を返す。
    async fn remove(&self, id: &ConnectionId) -> Option<Connection>;

    async fn get(&self, id: &ConnectionId) -> Option<Connection>;

    /// A user may hold several connections at once.
    async fn list_by_principal(&self, user_id: &UserId) -> Vec<ConnectionId>;

    async fn set_state(&self, id: &ConnectionId, state: ConnectionState) -> bool;

    /// 受信トラフィックを生存確認として記録
    async fn touch(&self, id: &ConnectionId, now: Timestamp) -> bool;

    async fn add_room(&self, id: &ConnectionId, room: RoomKey) -> bool;

    async fn remove_room(&self, id: &ConnectionId, room: &RoomKey) -> bool;

    async fn is_member(&self, id: &ConnectionId, room: &RoomKey) -> bool;

    async fn outbound(&self, id: &ConnectionId) -> Option<OutboundChannel>;

    /// `max_silence_millis` 以上通信のない接続
    async fn stale_connections(&self, now: Timestamp, max_silence_millis: i64)
    -> Vec<ConnectionId>;

    async fn count(&self) -> usize;
}

/// Result of one `publish` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// 配送に成功したメンバー数
    pub delivered: usize,
    /// 配送に失敗し Registry から削除された接続
    pub evicted: Vec<ConnectionId>,
}

/// Room Router trait
///
/// ルームキーから購読中の接続集合へのマッピングとファンアウトを担う。
#[async_trait]
pub trait RoomRouter: Send + Sync {
    /// Add a member. Returns `false` if the connection has no outbound queue.
    async fn join(&self, room: &RoomKey, id: ConnectionId) -> bool;

    /// メンバーを削除し、空になったルームを破棄する
    async fn leave(&self, room: &RoomKey, id: &ConnectionId) -> bool;

    async fn leave_all(&self, id: &ConnectionId, rooms: &[RoomKey]);

    /// Deliver `event` to every current member, in member join order.
    async fn publish(&self, room: &RoomKey, event: &Event) -> PublishOutcome;

    async fn members(&self, room: &RoomKey) -> Vec<ConnectionId>;

    /// ルームキーとメンバー数のスナップショット
    async fn room_sizes(&self) -> Vec<(RoomKey, usize)>;
}
