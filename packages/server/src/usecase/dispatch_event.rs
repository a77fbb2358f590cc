//! UseCase: イベント配送処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DispatchEventUseCase::dispatch_client() / dispatch_system() / dispatch_system_to()
//! - イベント種別の発生元チェック、スキーマ検証、メンバーシップチェック
//!
//! ### なぜこのテストが必要か
//! - 検証に失敗したイベントが決して publish されないことを保証する
//! - クライアントが購読していないルームへ送信できないことを確認する
//! - システムイベントがメンバーシップチェックを免除されることを確認する
//!
//! ### どのような状況を想定しているか
//! - 正常系：購読済みチャットへの送信、注文更新のシステム配送
//! - 異常系：未購読ルームへのチャット、ドライバー以外の位置情報、範囲外の座標
//! - エッジケース：aggregate_updated の admin_broadcast への配送

use std::sync::Arc;

use haiso_shared::time::Clock;

use crate::domain::{
    ConnectionId, ConnectionRegistry, Event, EventPayload, EventValidationError, Origin, Role,
    RoomKey, RoomRouter, Timestamp,
};

use super::error::DispatchError;

/// publish の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub room: RoomKey,
    pub delivered: usize,
    pub evicted: usize,
}

/// イベント配送のユースケース
pub struct DispatchEventUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    router: Arc<dyn RoomRouter>,
    clock: Arc<dyn Clock>,
}

impl DispatchEventUseCase {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        router: Arc<dyn RoomRouter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            router,
            clock,
        }
    }

    /// クライアントから受信したイベントを配送する
    ///
    /// 送信者は宛先ルームのメンバーでなければならない。
    pub async fn dispatch_client(
        &self,
        sender: &ConnectionId,
        payload: EventPayload,
    ) -> Result<DeliveryReport, DispatchError> {
        let connection = self
            .registry
            .get(sender)
            .await
            .ok_or(DispatchError::UnknownConnection(*sender))?;

        let event_type = payload.event_type();
        if event_type.origin() != Origin::Client {
            return Err(EventValidationError::NotClientOriginated(event_type.as_str()).into());
        }
        payload.validate()?;

        if matches!(payload, EventPayload::LocationUpdate(_))
            && connection.principal.role != Role::Driver
        {
            return Err(DispatchError::Forbidden(
                "only drivers may publish location updates".to_string(),
            ));
        }

        let source = connection.principal.user_id;
        let room = payload.target_room(Some(&source)).ok_or_else(|| {
            EventValidationError::field("roomId", "does not resolve to a room")
        })?;
        if !connection.rooms.contains(&room) {
            tracing::warn!(
                "User '{}' sent '{}' to '{}' without being a member",
                source,
                event_type.as_str(),
                room
            );
            return Err(DispatchError::Forbidden(format!(
                "not a member of room '{}'",
                room
            )));
        }

        let event = Event {
            payload,
            timestamp: self.now(),
            source_user_id: Some(source),
            room: Some(room.clone()),
        };
        Ok(self.publish(room, &event).await)
    }

    /// ビジネスロジックからのイベントをデフォルトのルームへ配送する
    pub async fn dispatch_system(
        &self,
        payload: EventPayload,
    ) -> Result<DeliveryReport, DispatchError> {
        let room = payload
            .target_room(None)
            .ok_or(EventValidationError::NotSystemOriginated(
                payload.event_type().as_str(),
            ))?;
        self.dispatch_system_to(room, payload).await
    }

    /// ビジネスロジックからのイベントを指定のルームへ配送する
    ///
    /// メンバーシップチェックは行わない。
    pub async fn dispatch_system_to(
        &self,
        room: RoomKey,
        payload: EventPayload,
    ) -> Result<DeliveryReport, DispatchError> {
        let event_type = payload.event_type();
        if event_type.origin() != Origin::System {
            return Err(EventValidationError::NotSystemOriginated(event_type.as_str()).into());
        }
        payload.validate()?;
        if !payload.permits_room(&room, None) {
            return Err(EventValidationError::RoomNotPermitted {
                event_type: event_type.as_str(),
                room: room.to_string(),
            }
            .into());
        }

        let event = Event {
            payload,
            timestamp: self.now(),
            source_user_id: None,
            room: Some(room.clone()),
        };
        Ok(self.publish(room, &event).await)
    }

    async fn publish(&self, room: RoomKey, event: &Event) -> DeliveryReport {
        let outcome = self.router.publish(&room, event).await;
        DeliveryReport {
            room,
            delivered: outcome.delivered,
            evicted: outcome.evicted.len(),
        }
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }
}
