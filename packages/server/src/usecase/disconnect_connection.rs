//! UseCase: 接続切断処理
//!
//! 明示的なクローズ、ハートビートのタイムアウト、配送失敗のいずれからも呼ばれる。
//! 冪等であり、2 回目以降の呼び出しは何もしない。

use std::sync::Arc;

use crate::domain::{Connection, ConnectionId, ConnectionRegistry, RoomKey, RoomRouter};

/// 接続切断のユースケース
pub struct DisconnectConnectionUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    router: Arc<dyn RoomRouter>,
}

impl DisconnectConnectionUseCase {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, router: Arc<dyn RoomRouter>) -> Self {
        Self { registry, router }
    }

    /// Registry と全ルームから接続を削除する
    ///
    /// # Returns
    ///
    /// * `Some(Connection)` - 今回の呼び出しで削除された接続
    /// * `None` - 既に削除済み
    pub async fn execute(&self, id: &ConnectionId) -> Option<Connection> {
        let connection = self.registry.remove(id).await?;

        let rooms: Vec<RoomKey> = connection.rooms.iter().cloned().collect();
        self.router.leave_all(id, &rooms).await;

        tracing::info!(
            "Connection '{}' of user '{}' closed ({} rooms left)",
            id,
            connection.principal.user_id,
            rooms.len()
        );
        Some(connection)
    }
}
