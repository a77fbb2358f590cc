//! UseCase: 注文ステータスの更新と order_update の配送
//!
//! 注文レコードそのものは外部の CRUD 層が持つ。ここでは参照用ストアへの
//! 反映と、`order:<id>` ルームへの通知だけを行う。

use std::sync::Arc;

use crate::domain::{
    EventPayload, Order, OrderId, OrderRepository, OrderStatus, OrderUpdatePayload,
    RepositoryError,
};

use super::{
    dispatch_event::{DeliveryReport, DispatchEventUseCase},
    error::OrderError,
};

/// 注文更新のユースケース
pub struct UpdateOrderStatusUseCase {
    orders: Arc<dyn OrderRepository>,
    dispatcher: Arc<DispatchEventUseCase>,
}

impl UpdateOrderStatusUseCase {
    pub fn new(orders: Arc<dyn OrderRepository>, dispatcher: Arc<DispatchEventUseCase>) -> Self {
        Self { orders, dispatcher }
    }

    /// 注文レコードを登録または置き換える
    pub async fn upsert(&self, order: Order) -> Result<Order, OrderError> {
        self.orders
            .save_order(order.clone())
            .await
            .map_err(OrderError::Repository)?;
        tracing::info!("Order '{}' saved with status {:?}", order.id, order.status);
        Ok(order)
    }

    /// ステータスを更新し、注文ルームに order_update を配送する
    ///
    /// # Returns
    ///
    /// * `Ok((Order, DeliveryReport))` - 更新後の注文と配送結果
    /// * `Err(OrderError::NotFound)` - 注文が存在しない
    pub async fn execute(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        metadata: Option<serde_json::Value>,
    ) -> Result<(Order, DeliveryReport), OrderError> {
        let order = self
            .orders
            .update_status(&order_id, status)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => OrderError::NotFound(order_id.clone()),
                other => OrderError::Repository(other),
            })?;

        let report = self
            .dispatcher
            .dispatch_system(EventPayload::OrderUpdate(OrderUpdatePayload {
                order_id: order.id.clone(),
                status,
                metadata,
            }))
            .await?;

        tracing::info!(
            "Order '{}' is now {:?}; notified {} connection(s)",
            order.id,
            status,
            report.delivered
        );
        Ok((order, report))
    }
}
