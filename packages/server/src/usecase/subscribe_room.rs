//! UseCase: ルーム購読処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SubscribeRoomUseCase::subscribe() / unsubscribe()
//! - ルーム種別ごとの認可と、Registry / Router の両方へのメンバー登録
//!
//! ### なぜこのテストが必要か
//! - 認可されない購読がメンバーを一切作らないことを保証する
//! - 注文レコードを参照した認可が正しく行われることを確認する
//!
//! ### どのような状況を想定しているか
//! - 正常系：注文の当事者による order ルームの購読、購読解除
//! - 異常系：無関係なユーザーによる購読、未登録の接続
//! - エッジケース：進行中の注文を持つ顧客による driver_location の購読

use std::sync::Arc;

use crate::domain::{
    ConnectionId, ConnectionRegistry, Order, OrderRepository, Principal, RoomKey, RoomRouter,
    can_subscribe,
};

use super::error::SubscribeError;

/// ルーム購読のユースケース
pub struct SubscribeRoomUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    router: Arc<dyn RoomRouter>,
    orders: Arc<dyn OrderRepository>,
}

impl SubscribeRoomUseCase {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        router: Arc<dyn RoomRouter>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self {
            registry,
            router,
            orders,
        }
    }

    /// 認可を確認してルームを購読する
    ///
    /// 認可されない場合は `SubscribeError::Forbidden` を返し、メンバーは作られない。
    pub async fn subscribe(
        &self,
        id: &ConnectionId,
        room: RoomKey,
    ) -> Result<RoomKey, SubscribeError> {
        let connection = self
            .registry
            .get(id)
            .await
            .ok_or(SubscribeError::UnknownConnection(*id))?;

        if !self.is_authorized(&connection.principal, &room).await? {
            tracing::warn!(
                "User '{}' ({}) is not allowed to subscribe to '{}'",
                connection.principal.user_id,
                connection.principal.role,
                room
            );
            return Err(SubscribeError::Forbidden(room));
        }

        if !self.registry.add_room(id, room.clone()).await {
            return Err(SubscribeError::UnknownConnection(*id));
        }
        if !self.router.join(&room, *id).await {
            self.registry.remove_room(id, &room).await;
            return Err(SubscribeError::UnknownConnection(*id));
        }

        tracing::info!("Connection '{}' subscribed to '{}'", id, room);
        Ok(room)
    }

    /// ルームの購読を解除する
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - 購読していたルームから抜けた
    /// * `Ok(false)` - もともと購読していなかった
    pub async fn unsubscribe(
        &self,
        id: &ConnectionId,
        room: &RoomKey,
    ) -> Result<bool, SubscribeError> {
        if self.registry.get(id).await.is_none() {
            return Err(SubscribeError::UnknownConnection(*id));
        }

        let was_member = self.registry.remove_room(id, room).await;
        let left = self.router.leave(room, id).await;
        if was_member || left {
            tracing::info!("Connection '{}' unsubscribed from '{}'", id, room);
        }
        Ok(was_member || left)
    }

    async fn is_authorized(
        &self,
        principal: &Principal,
        room: &RoomKey,
    ) -> Result<bool, SubscribeError> {
        // 管理者は order / driver_location の判定にレコードを必要としない
        let lookup = !principal.is_admin();

        let order = match room {
            RoomKey::Order(order_id) if lookup => self.orders.get_order(order_id).await?,
            _ => None,
        };
        let driver_orders: Vec<Order> = match room {
            RoomKey::DriverLocation(driver_id) if lookup && driver_id != &principal.user_id => {
                self.orders.orders_for_driver(driver_id).await?
            }
            _ => Vec::new(),
        };

        Ok(can_subscribe(principal, room, order.as_ref(), &driver_orders))
    }
}
