//! UseCase: ハートビート監視
//!
//! 受信トラフィックはすべて生存確認として扱う。最後の受信から `2 × interval`
//! 経過した接続は強制的に切断し、Registry と全ルームから削除する。
//! 応答しなくなったピアを回収する唯一の経路。

use std::{sync::Arc, time::Duration};

use haiso_shared::time::Clock;

use crate::domain::{ConnectionId, ConnectionRegistry, Timestamp};

use super::disconnect_connection::DisconnectConnectionUseCase;

/// ハートビート 1 回分の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatStatus {
    /// まだ生きている。`remaining` 後に無通信のままならタイムアウトする
    Alive { remaining: Duration },
    /// 無通信でタイムアウトし、今回切断した
    Expired,
    /// 既に Registry から削除されている
    Gone,
}

pub struct HeartbeatMonitor {
    registry: Arc<dyn ConnectionRegistry>,
    disconnect: Arc<DisconnectConnectionUseCase>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl HeartbeatMonitor {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        disconnect: Arc<DisconnectConnectionUseCase>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            disconnect,
            clock,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 無通信とみなすまでの時間（`2 × interval`）
    pub fn max_silence(&self) -> Duration {
        self.interval * 2
    }

    /// 受信トラフィックを記録する
    pub async fn record_traffic(&self, id: &ConnectionId) -> bool {
        self.registry.touch(id, self.now()).await
    }

    /// 接続の生存を判定し、タイムアウトしていれば切断する
    pub async fn check(&self, id: &ConnectionId) -> HeartbeatStatus {
        let Some(connection) = self.registry.get(id).await else {
            return HeartbeatStatus::Gone;
        };

        let max_silence_millis = i64::try_from(self.max_silence().as_millis()).unwrap_or(i64::MAX);
        let now = self.now();
        if !connection.is_silent_since(now, max_silence_millis) {
            let silent_for = connection.last_heartbeat.millis_until(now);
            let remaining = u64::try_from(max_silence_millis - silent_for).unwrap_or(0);
            return HeartbeatStatus::Alive {
                remaining: Duration::from_millis(remaining),
            };
        }

        tracing::warn!(
            "Connection '{}' of user '{}' missed heartbeats for {:?}; closing",
            id,
            connection.principal.user_id,
            self.max_silence()
        );
        match self.disconnect.execute(id).await {
            Some(_) => HeartbeatStatus::Expired,
            None => HeartbeatStatus::Gone,
        }
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }
}
