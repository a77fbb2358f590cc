//! Pure authorization and reputation rules.
//!
//! I/O を伴わない純粋関数として定義し、UseCase 層から呼び出します。

use super::{
    entity::{Order, OrderParty},
    value_object::{Principal, RoomKey},
};

/// Decide whether `principal` may subscribe to `room`.
///
/// `order` is the record behind an `order:<id>` room (absent if unknown) and
/// `driver_orders` the orders currently assigned to the driver behind a
/// `driver_location:<driverId>` room. Both are ignored for other room types.
///
/// Admins may join any room except another user's `user:<id>` room.
pub fn can_subscribe(
    principal: &Principal,
    room: &RoomKey,
    order: Option<&Order>,
    driver_orders: &[Order],
) -> bool {
    match room {
        // 個人ルームは管理者であっても本人以外は購読できない
        RoomKey::User(user_id) => &principal.user_id == user_id,
        RoomKey::Chat(_) => true,
        _ if principal.is_admin() => true,
        RoomKey::Order(_) => order.is_some_and(|o| o.is_party(&principal.user_id)),
        RoomKey::DriverLocation(driver_id) => {
            if &principal.user_id == driver_id {
                return true;
            }
            driver_orders.iter().any(|o| {
                o.is_assigned_to(driver_id)
                    && !o.status.is_terminal()
                    && matches!(
                        o.party_of(&principal.user_id),
                        Some(OrderParty::Customer | OrderParty::Merchant)
                    )
            })
        }
        RoomKey::AdminBroadcast => false,
    }
}

/// Whether a party in `rater` position may rate a party in `rated` position.
///
/// Customers rate drivers and merchants; drivers rate customers.
pub fn can_rate(rater: OrderParty, rated: OrderParty) -> bool {
    matches!(
        (rater, rated),
        (OrderParty::Customer, OrderParty::Driver)
            | (OrderParty::Customer, OrderParty::Merchant)
            | (OrderParty::Driver, OrderParty::Customer)
    )
}

/// Low-reputation alerting rule for drivers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReputationPolicy {
    pub low_reputation_threshold: f64,
}

impl ReputationPolicy {
    pub const DEFAULT_THRESHOLD: f64 = 3.0;

    pub fn new(low_reputation_threshold: f64) -> Self {
        Self {
            low_reputation_threshold,
        }
    }

    /// 平均がしきい値を下回ったか（以前は未評価またはしきい値以上）
    pub fn crosses(&self, previous_average: Option<f64>, new_average: f64) -> bool {
        let was_above = previous_average.is_none_or(|avg| avg >= self.low_reputation_threshold);
        was_above && new_average < self.low_reputation_threshold
    }
}

impl Default for ReputationPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        entity::OrderStatus,
        value_object::{ChatRoomId, OrderId, Role, UserId},
    };

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn principal(id: &str, role: Role) -> Principal {
        Principal::new(user(id), role)
    }

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new("42".to_string()).unwrap(),
            customer_id: user("c1"),
            merchant_id: user("m1"),
            driver_id: Some(user("d1")),
            status,
        }
    }

    fn order_room() -> RoomKey {
        RoomKey::Order(OrderId::new("42".to_string()).unwrap())
    }

    #[test]
    fn test_order_room_allows_parties_and_admins() {
        // テスト項目: 注文ルームは当事者と管理者のみ購読できる
        // given (前提条件):
        let order = order(OrderStatus::InTransit);
        let room = order_room();

        // when (操作) / then (期待する結果):
        for (id, role) in [
            ("c1", Role::Customer),
            ("m1", Role::Merchant),
            ("d1", Role::Driver),
            ("root", Role::Admin),
        ] {
            assert!(can_subscribe(&principal(id, role), &room, Some(&order), &[]));
        }
        assert!(!can_subscribe(
            &principal("c2", Role::Customer),
            &room,
            Some(&order),
            &[]
        ));
    }

    #[test]
    fn test_unknown_order_room_is_admin_only() {
        // テスト項目: 存在しない注文のルームは管理者以外購読できない
        // given (前提条件):
        let room = order_room();

        // when (操作) / then (期待する結果):
        assert!(!can_subscribe(&principal("c1", Role::Customer), &room, None, &[]));
        assert!(can_subscribe(&principal("root", Role::Admin), &room, None, &[]));
    }

    #[test]
    fn test_admin_broadcast_is_admin_only() {
        // テスト項目: admin_broadcast は管理者のみ
        // given (前提条件):
        let room = RoomKey::AdminBroadcast;

        // when (操作) / then (期待する結果):
        assert!(can_subscribe(&principal("root", Role::Admin), &room, None, &[]));
        assert!(!can_subscribe(&principal("d1", Role::Driver), &room, None, &[]));
    }

    #[test]
    fn test_user_room_is_owner_only() {
        // テスト項目: 個人ルームは本人のみ購読できる
        // given (前提条件):
        let room = RoomKey::User(user("c1"));

        // when (操作) / then (期待する結果):
        assert!(can_subscribe(&principal("c1", Role::Customer), &room, None, &[]));
        assert!(!can_subscribe(&principal("c2", Role::Customer), &room, None, &[]));
        assert!(!can_subscribe(&principal("a1", Role::Admin), &room, None, &[]));
    }

    #[test]
    fn test_chat_room_is_open_to_authenticated_principals() {
        // テスト項目: チャットルームは認証済みなら誰でも購読できる
        // given (前提条件):
        let room = RoomKey::Chat(ChatRoomId::new("7".to_string()).unwrap());

        // when (操作) / then (期待する結果):
        assert!(can_subscribe(&principal("m9", Role::Merchant), &room, None, &[]));
    }

    #[test]
    fn test_driver_location_room_rules() {
        // テスト項目: ドライバー位置ルームは本人・管理者・進行中注文の顧客と店舗のみ
        // given (前提条件):
        let room = RoomKey::DriverLocation(user("d1"));
        let active = [order(OrderStatus::PickedUp)];
        let finished = [order(OrderStatus::Delivered)];

        // when (操作) / then (期待する結果):
        assert!(can_subscribe(&principal("d1", Role::Driver), &room, None, &[]));
        assert!(can_subscribe(&principal("c1", Role::Customer), &room, None, &active));
        assert!(can_subscribe(&principal("m1", Role::Merchant), &room, None, &active));
        assert!(!can_subscribe(&principal("c1", Role::Customer), &room, None, &finished));
        assert!(!can_subscribe(&principal("c2", Role::Customer), &room, None, &active));
        assert!(!can_subscribe(&principal("d2", Role::Driver), &room, None, &active));
    }

    #[test]
    fn test_can_rate_pairs() {
        // テスト項目: 評価可能な当事者の組み合わせ
        // given (前提条件):

        // when (操作) / then (期待する結果):
        assert!(can_rate(OrderParty::Customer, OrderParty::Driver));
        assert!(can_rate(OrderParty::Customer, OrderParty::Merchant));
        assert!(can_rate(OrderParty::Driver, OrderParty::Customer));
        assert!(!can_rate(OrderParty::Merchant, OrderParty::Customer));
        assert!(!can_rate(OrderParty::Driver, OrderParty::Merchant));
        assert!(!can_rate(OrderParty::Customer, OrderParty::Customer));
    }

    #[test]
    fn test_reputation_crossing() {
        // テスト項目: しきい値を上から下へ跨いだときのみ検知する
        // given (前提条件):
        let policy = ReputationPolicy::new(3.0);

        // when (操作) / then (期待する結果):
        assert!(policy.crosses(Some(3.2), 2.9));
        assert!(policy.crosses(Some(3.0), 2.5));
        assert!(policy.crosses(None, 1.0));
        assert!(!policy.crosses(Some(2.8), 2.5));
        assert!(!policy.crosses(Some(4.0), 3.0));
        assert!(!policy.crosses(None, 4.0));
    }
}
