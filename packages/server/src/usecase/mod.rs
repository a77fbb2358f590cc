//! UseCase layer
//!
//! ドメインの trait を組み合わせてアプリケーションの操作を実装する層。
//! UI 層（WebSocket / HTTP ハンドラー）からのみ呼び出されます。

pub mod admit_connection;
pub mod disconnect_connection;
pub mod dispatch_event;
pub mod error;
pub mod heartbeat;
pub mod query;
pub mod submit_rating;
pub mod subscribe_room;
pub mod update_order_status;

pub use admit_connection::AdmitConnectionUseCase;
pub use disconnect_connection::DisconnectConnectionUseCase;
pub use dispatch_event::{DeliveryReport, DispatchEventUseCase};
pub use error::{AdmitError, DispatchError, OrderError, RatingError, SubscribeError};
pub use heartbeat::{HeartbeatMonitor, HeartbeatStatus};
pub use query::QueryUseCase;
pub use submit_rating::{RatingReceipt, SubmitRatingCommand, SubmitRatingUseCase};
pub use subscribe_room::SubscribeRoomUseCase;
pub use update_order_status::UpdateOrderStatusUseCase;
