//! Domain layer
//!
//! ビジネスルールとインターフェース（trait）を定義する層。
//! 他のどの層にも依存しません。

pub mod entity;
pub mod error;
pub mod event;
pub mod policy;
pub mod principal;
pub mod registry;
pub mod repository;
pub mod value_object;

pub use entity::{AggregateScore, Connection, ConnectionState, Order, OrderParty, OrderStatus, Rating};
pub use error::{AuthError, EventValidationError, MessagePushError, RepositoryError, ValueObjectError};
pub use event::{
    AggregateUpdatedPayload, ChatMessagePayload, Event, EventPayload, EventType,
    LocationUpdatePayload, OrderUpdatePayload, Origin, PresenceStatus, PresenceUpdatePayload,
    RatingSubmittedPayload,
};
pub use policy::{ReputationPolicy, can_rate, can_subscribe};
pub use principal::PrincipalResolver;
pub use registry::{
    ConnectionHandle, ConnectionRegistry, OutboundChannel, PublishOutcome, RoomRouter,
};
pub use repository::{OrderRepository, RatingRepository, RatingTransaction};
pub use value_object::{
    ChatRoomId, ConnectionId, OrderId, Principal, Role, RoomKey, RoomType, Score, Timestamp,
    UserId,
};

#[cfg(test)]
pub use principal::MockPrincipalResolver;
#[cfg(test)]
pub use repository::MockOrderRepository;
