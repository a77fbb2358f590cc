//! InMemory Connection Registry 実装
//!
//! ドメイン層が定義する ConnectionRegistry trait の具体的な実装。
//! 接続エンティティと送信ハンドルを HashMap で保持します。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    Connection, ConnectionHandle, ConnectionId, ConnectionRegistry, ConnectionState,
    OutboundChannel, Principal, RoomKey, Timestamp, UserId,
};

struct Entry {
    connection: Connection,
    handle: ConnectionHandle,
}

/// インメモリ Connection Registry 実装
#[derive(Default)]
pub struct InMemoryConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Entry>>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn admit(
        &self,
        principal: Principal,
        handle: ConnectionHandle,
        now: Timestamp,
    ) -> Connection {
        let mut connections = self.connections.write().await;

        let id = ConnectionId::generate();
        let connection = Connection::new(id, principal, now);
        connections.insert(
            id,
            Entry {
                connection: connection.clone(),
                handle,
            },
        );
        tracing::debug!(
            "Connection '{}' admitted for user '{}' ({} live)",
            id,
            connection.principal.user_id,
            connections.len()
        );
        connection
    }

    async fn remove(&self, id: &ConnectionId) -> Option<Connection> {
        let entry = self.connections.write().await.remove(id)?;

        entry.handle.close.send_replace(true);
        let mut connection = entry.connection;
        connection.state = ConnectionState::Closed;
        tracing::debug!("Connection '{}' removed from registry", id);
        Some(connection)
    }

    async fn get(&self, id: &ConnectionId) -> Option<Connection> {
        let connections = self.connections.read().await;
        connections.get(id).map(|e| e.connection.clone())
    }

    async fn list_by_principal(&self, user_id: &UserId) -> Vec<ConnectionId> {
        let connections = self.connections.read().await;
        let mut ids: Vec<ConnectionId> = connections
            .values()
            .filter(|e| &e.connection.principal.user_id == user_id)
            .map(|e| e.connection.id)
            .collect();
        ids.sort();
        ids
    }

    async fn set_state(&self, id: &ConnectionId, state: ConnectionState) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(id) {
            Some(entry) => {
                entry.connection.state = state;
                true
            }
            None => false,
        }
    }

    async fn touch(&self, id: &ConnectionId, now: Timestamp) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(id) {
            Some(entry) => {
                if now > entry.connection.last_heartbeat {
                    entry.connection.last_heartbeat = now;
                }
                true
            }
            None => false,
        }
    }

    async fn add_room(&self, id: &ConnectionId, room: RoomKey) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(id) {
            Some(entry) => {
                entry.connection.rooms.insert(room);
                true
            }
            None => false,
        }
    }

    async fn remove_room(&self, id: &ConnectionId, room: &RoomKey) -> bool {
        let mut connections = self.connections.write().await;
        connections
            .get_mut(id)
            .is_some_and(|entry| entry.connection.rooms.remove(room))
    }

    async fn is_member(&self, id: &ConnectionId, room: &RoomKey) -> bool {
        let connections = self.connections.read().await;
        connections
            .get(id)
            .is_some_and(|entry| entry.connection.is_member_of(room))
    }

    async fn outbound(&self, id: &ConnectionId) -> Option<OutboundChannel> {
        let connections = self.connections.read().await;
        connections.get(id).map(|entry| entry.handle.outbound.clone())
    }

    async fn stale_connections(
        &self,
        now: Timestamp,
        max_silence_millis: i64,
    ) -> Vec<ConnectionId> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|e| e.connection.is_silent_since(now, max_silence_millis))
            .map(|e| e.connection.id)
            .collect()
    }

    async fn count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use tokio::sync::{mpsc, watch};

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - 接続の登録・削除・プリンシパル別一覧
    // - 削除の冪等性と終了通知
    // - 最終通信時刻の更新と無通信接続の抽出
    // ========================================

    fn principal(id: &str) -> Principal {
        Principal::new(UserId::new(id.to_string()).unwrap(), Role::Customer)
    }

    fn handle() -> (ConnectionHandle, mpsc::Receiver<String>, watch::Receiver<bool>) {
        let (tx, rx) = mpsc::channel(8);
        let (close_tx, close_rx) = watch::channel(false);
        (ConnectionHandle::new(tx, close_tx), rx, close_rx)
    }

    #[tokio::test]
    async fn test_admit_assigns_unique_ids() {
        // テスト項目: 同じユーザーの複数接続にそれぞれ別の ID が割り当てられる
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();
        let (h1, _rx1, _c1) = handle();
        let (h2, _rx2, _c2) = handle();

        // when (操作):
        let first = registry.admit(principal("c1"), h1, Timestamp::new(0)).await;
        let second = registry.admit(principal("c1"), h2, Timestamp::new(0)).await;

        // then (期待する結果):
        assert_ne!(first.id, second.id);
        assert_eq!(first.state, ConnectionState::Connecting);
        let ids = registry
            .list_by_principal(&UserId::new("c1".to_string()).unwrap())
            .await;
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id) && ids.contains(&second.id));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent_and_signals_close() {
        // テスト項目: 削除は冪等であり、初回削除時に終了が通知される
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();
        let (h, _rx, close_rx) = handle();
        let connection = registry.admit(principal("c1"), h, Timestamp::new(0)).await;

        // when (操作):
        let first = registry.remove(&connection.id).await;
        let second = registry.remove(&connection.id).await;

        // then (期待する結果):
        assert_eq!(first.map(|c| c.state), Some(ConnectionState::Closed));
        assert!(second.is_none());
        assert!(*close_rx.borrow());
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_room_membership_tracking() {
        // テスト項目: 接続ごとの購読ルームが記録・解除される
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();
        let (h, _rx, _close) = handle();
        let connection = registry.admit(principal("c1"), h, Timestamp::new(0)).await;
        let room: RoomKey = "order:42".parse().unwrap();

        // when (操作):
        registry.add_room(&connection.id, room.clone()).await;

        // then (期待する結果):
        assert!(registry.is_member(&connection.id, &room).await);
        assert!(registry.remove_room(&connection.id, &room).await);
        assert!(!registry.is_member(&connection.id, &room).await);
        assert!(!registry.remove_room(&connection.id, &room).await);
    }

    #[tokio::test]
    async fn test_stale_connections_by_last_traffic() {
        // テスト項目: 最終通信から一定時間経過した接続のみ抽出される
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();
        let (h1, _rx1, _c1) = handle();
        let (h2, _rx2, _c2) = handle();
        let quiet = registry.admit(principal("c1"), h1, Timestamp::new(0)).await;
        let chatty = registry.admit(principal("c2"), h2, Timestamp::new(0)).await;

        // when (操作):
        registry.touch(&chatty.id, Timestamp::new(50_000)).await;
        let stale = registry
            .stale_connections(Timestamp::new(60_000), 60_000)
            .await;

        // then (期待する結果):
        assert_eq!(stale, vec![quiet.id]);
    }

    #[tokio::test]
    async fn test_operations_on_unknown_connection() {
        // テスト項目: 未登録の接続への操作は失敗を返す
        // given (前提条件):
        let registry = InMemoryConnectionRegistry::new();
        let unknown = ConnectionId::generate();

        // when (操作) / then (期待する結果):
        assert!(!registry.touch(&unknown, Timestamp::new(1)).await);
        assert!(!registry.add_room(&unknown, RoomKey::AdminBroadcast).await);
        assert!(registry.outbound(&unknown).await.is_none());
        assert!(registry.get(&unknown).await.is_none());
    }
}
