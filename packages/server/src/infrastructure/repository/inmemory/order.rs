//! InMemory Order Repository 実装
//!
//! CRUD 層の注文テーブルの代わりとなるインメモリストア。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Order, OrderId, OrderRepository, OrderStatus, RepositoryError, UserId};

/// インメモリ Order Repository 実装
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            orders: RwLock::new(orders.into_iter().map(|o| (o.id.clone(), o)).collect()),
        }
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn orders_for_driver(&self, driver_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut assigned: Vec<Order> = orders
            .values()
            .filter(|o| o.is_assigned_to(driver_id))
            .cloned()
            .collect();
        assigned.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(assigned)
    }

    async fn save_order(&self, order: Order) -> Result<(), RepositoryError> {
        self.orders.write().await.insert(order.id.clone(), order);
        Ok(())
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("order '{}'", id)))?;
        order.status = status;
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str, driver: Option<&str>) -> Order {
        Order {
            id: OrderId::new(id.to_string()).unwrap(),
            customer_id: UserId::new("c1".to_string()).unwrap(),
            merchant_id: UserId::new("m1".to_string()).unwrap(),
            driver_id: driver.map(|d| UserId::new(d.to_string()).unwrap()),
            status: OrderStatus::Accepted,
        }
    }

    #[tokio::test]
    async fn test_orders_for_driver() {
        // テスト項目: ドライバーに割り当てられた注文のみ返す
        // given (前提条件):
        let repository = InMemoryOrderRepository::with_orders([
            order("o1", Some("d1")),
            order("o2", Some("d2")),
            order("o3", None),
            order("o4", Some("d1")),
        ]);

        // when (操作):
        let assigned = repository
            .orders_for_driver(&UserId::new("d1".to_string()).unwrap())
            .await
            .unwrap();

        // then (期待する結果):
        let ids: Vec<&str> = assigned.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o4"]);
    }

    #[tokio::test]
    async fn test_update_status() {
        // テスト項目: 注文ステータスを更新でき、未登録の注文は NotFound
        // given (前提条件):
        let repository = InMemoryOrderRepository::with_orders([order("o1", Some("d1"))]);
        let id = OrderId::new("o1".to_string()).unwrap();
        let missing = OrderId::new("o9".to_string()).unwrap();

        // when (操作):
        let updated = repository
            .update_status(&id, OrderStatus::Delivered)
            .await
            .unwrap();
        let not_found = repository.update_status(&missing, OrderStatus::Delivered).await;

        // then (期待する結果):
        assert_eq!(updated.status, OrderStatus::Delivered);
        assert_eq!(
            repository.get_order(&id).await.unwrap().unwrap().status,
            OrderStatus::Delivered
        );
        assert!(matches!(not_found, Err(RepositoryError::NotFound(_))));
    }
}
