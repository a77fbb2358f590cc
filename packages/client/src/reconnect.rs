//! Reconnection Controller.
//!
//! 接続状態の遷移は `Disconnected → Connecting → Open → Disconnected → …` で、
//! 連続して `max_attempts` 回再接続に失敗すると終端状態 `Failed` になる。
//! 試行 n 回目の待ち時間は `base_interval × n`（線形）。
//!
//! サーバーは接続をまたいだ購読を覚えていないため、再接続のたびに
//! 購読していた全ルームをクライアントから再購読する。

use std::{collections::BTreeSet, time::Duration};

use async_trait::async_trait;
use haiso_server::domain::RoomKey;

use crate::error::ClientError;

/// 接続状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// 終端状態。これ以上再接続しない
    Failed,
}

/// 再接続の間隔と上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_interval: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(1000);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    pub fn new(base_interval: Duration, max_attempts: u32) -> Self {
        Self {
            base_interval,
            max_attempts,
        }
    }

    /// 試行 `attempt` 回目（1 始まり）の待ち時間
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_interval * attempt
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_INTERVAL, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// 購読中のルーム（再接続時の再購読に使う）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscriptions {
    rooms: BTreeSet<RoomKey>,
}

impl Subscriptions {
    pub fn new(rooms: impl IntoIterator<Item = RoomKey>) -> Self {
        Self {
            rooms: rooms.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, room: RoomKey) -> bool {
        self.rooms.insert(room)
    }

    pub fn remove(&mut self, room: &RoomKey) -> bool {
        self.rooms.remove(room)
    }

    pub fn contains(&self, room: &RoomKey) -> bool {
        self.rooms.contains(room)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoomKey> {
        self.rooms.iter()
    }
}

/// セッションが終わった理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// ユーザーが終了した。再接続しない
    UserExit,
    /// 接続が切れた。再接続する
    ConnectionLost(String),
}

/// 接続の実体（WebSocket など）
///
/// Reconnection Controller はこの trait だけを通して接続を扱う。
#[async_trait]
pub trait Transport: Send {
    /// 新しい接続を張る。認証失敗は `ClientError::Authentication`
    async fn connect(&mut self) -> Result<(), ClientError>;

    /// ルームを購読し、サーバーの応答を待つ
    async fn subscribe(&mut self, room: &RoomKey) -> Result<(), ClientError>;

    /// 接続が切れるかユーザーが終了するまでセッションを続ける
    ///
    /// セッション中の購読 / 購読解除は `subscriptions` に反映する。
    async fn run_until_closed(&mut self, subscriptions: &mut Subscriptions) -> SessionEnd;
}

/// 再接続の状態機械
///
/// 時間の経過やソケットは扱わず、イベントを受けて次の状態と待ち時間を返す。
#[derive(Debug)]
pub struct ReconnectionController {
    policy: ReconnectPolicy,
    state: ConnectionState,
    /// 最後に Open になってから失敗した再接続の回数
    attempts: u32,
    subscriptions: Subscriptions,
}

impl ReconnectionController {
    pub fn new(policy: ReconnectPolicy, subscriptions: Subscriptions) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            attempts: 0,
            subscriptions,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn subscriptions_mut(&mut self) -> &mut Subscriptions {
        &mut self.subscriptions
    }

    /// 接続を開始する
    ///
    /// `Failed` からは遷移しない。
    pub fn on_connecting(&mut self) -> bool {
        if self.state == ConnectionState::Failed {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    /// 接続が確立した。再購読すべきルームを返す
    ///
    /// 状態は再購読が終わって `on_restored` が呼ばれるまで `Connecting` のまま。
    pub fn on_connected(&self) -> Vec<RoomKey> {
        self.subscriptions.iter().cloned().collect()
    }

    /// 再購読が拒否されたルームを忘れる
    pub fn on_replay_rejected(&mut self, room: &RoomKey) {
        self.subscriptions.remove(room);
    }

    /// 再購読が完了し、状態が復元された
    pub fn on_restored(&mut self) {
        self.state = ConnectionState::Open;
        self.attempts = 0;
    }

    /// 接続が切れた、または接続に失敗した
    ///
    /// # Returns
    ///
    /// * `Some(delay)` - `delay` 待ってから次の試行をする
    /// * `None` - 上限に達したため `Failed` になった
    pub fn on_disconnected(&mut self) -> Option<Duration> {
        if self.state == ConnectionState::Failed {
            return None;
        }
        if self.attempts >= self.policy.max_attempts {
            self.state = ConnectionState::Failed;
            return None;
        }
        self.state = ConnectionState::Disconnected;
        self.attempts += 1;
        Some(self.policy.delay_for(self.attempts))
    }

    /// 認証に失敗した。再試行しない
    pub fn on_auth_failure(&mut self) {
        self.state = ConnectionState::Failed;
    }

    /// ユーザーが終了した
    pub fn on_user_exit(&mut self) {
        self.state = ConnectionState::Disconnected;
    }
}
