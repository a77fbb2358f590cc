//! UseCase: 参照系（ヘルスチェック、デバッグ、集計の取得）

use std::sync::Arc;

use crate::domain::{
    AggregateScore, Connection, ConnectionRegistry, RatingRepository, RepositoryError, RoomKey,
    RoomRouter, UserId,
};

/// 参照系のユースケース
pub struct QueryUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    router: Arc<dyn RoomRouter>,
    ratings: Arc<dyn RatingRepository>,
}

impl QueryUseCase {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        router: Arc<dyn RoomRouter>,
        ratings: Arc<dyn RatingRepository>,
    ) -> Self {
        Self {
            registry,
            router,
            ratings,
        }
    }

    /// 登録中の接続数
    pub async fn connection_count(&self) -> usize {
        self.registry.count().await
    }

    /// ルームごとのメンバー数（ルームキー順）
    pub async fn room_sizes(&self) -> Vec<(RoomKey, usize)> {
        self.router.room_sizes().await
    }

    /// ユーザーが持つ接続の一覧
    pub async fn connections_of(&self, user_id: &UserId) -> Vec<Connection> {
        let mut connections = Vec::new();
        for id in self.registry.list_by_principal(user_id).await {
            if let Some(connection) = self.registry.get(&id).await {
                connections.push(connection);
            }
        }
        connections
    }

    /// 評価された側の集計。未評価なら平均 0 / 件数 0
    pub async fn aggregate_for(&self, user_id: &UserId) -> Result<AggregateScore, RepositoryError> {
        Ok(self
            .ratings
            .aggregate_for(user_id)
            .await?
            .unwrap_or_else(|| AggregateScore::recompute(user_id.clone(), [])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ConnectionHandle, Principal, Role, Timestamp},
        infrastructure::{
            registry::InMemoryConnectionRegistry, repository::InMemoryRatingRepository,
            router::InMemoryRoomRouter,
        },
    };
    use std::time::Duration;
    use tokio::sync::{mpsc, watch};

    #[tokio::test]
    async fn test_query_reports_connections_rooms_and_empty_aggregate() {
        // テスト項目: 接続数、ルームのメンバー数、未評価ユーザーの集計を返す
        // given (前提条件):
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let router = Arc::new(InMemoryRoomRouter::new(
            registry.clone(),
            Duration::from_millis(50),
        ));
        let usecase = QueryUseCase::new(
            registry.clone(),
            router.clone(),
            Arc::new(InMemoryRatingRepository::new()),
        );
        let user = UserId::new("d1".to_string()).unwrap();
        let mut channels = Vec::new();
        for _ in 0..2 {
            let (tx, rx) = mpsc::channel(8);
            let (close_tx, close_rx) = watch::channel(false);
            channels.push((rx, close_rx));
            let id = registry
                .admit(
                    Principal::new(user.clone(), Role::Driver),
                    ConnectionHandle::new(tx, close_tx),
                    Timestamp::new(0),
                )
                .await
                .id;
            router.join(&RoomKey::User(user.clone()), id).await;
        }

        // when (操作):
        let count = usecase.connection_count().await;
        let rooms = usecase.room_sizes().await;
        let connections = usecase.connections_of(&user).await;
        let aggregate = usecase.aggregate_for(&user).await.unwrap();

        // then (期待する結果):
        assert_eq!(count, 2);
        assert_eq!(rooms, vec![(RoomKey::User(user.clone()), 2)]);
        assert_eq!(connections.len(), 2);
        assert_eq!(aggregate.average, 0.0);
        assert_eq!(aggregate.count, 0);
    }
}
