//! Server state and connection management.

use std::sync::Arc;

use crate::{
    config::ServerConfig,
    domain::PrincipalResolver,
    usecase::{
        AdmitConnectionUseCase, DisconnectConnectionUseCase, DispatchEventUseCase,
        HeartbeatMonitor, QueryUseCase, SubmitRatingUseCase, SubscribeRoomUseCase,
        UpdateOrderStatusUseCase,
    },
};

/// Shared application state
///
/// Registry / Router はユースケースの中に注入されており、ハンドラーは直接触らない。
pub struct AppState {
    /// AdmitConnectionUseCase（接続受付のユースケース）
    pub admit_connection_usecase: Arc<AdmitConnectionUseCase>,
    /// DisconnectConnectionUseCase（接続切断のユースケース）
    pub disconnect_connection_usecase: Arc<DisconnectConnectionUseCase>,
    /// SubscribeRoomUseCase（ルーム購読のユースケース）
    pub subscribe_room_usecase: Arc<SubscribeRoomUseCase>,
    /// DispatchEventUseCase（イベント配送のユースケース）
    pub dispatch_event_usecase: Arc<DispatchEventUseCase>,
    /// HeartbeatMonitor（ハートビート監視）
    pub heartbeat_monitor: Arc<HeartbeatMonitor>,
    /// SubmitRatingUseCase（評価送信のユースケース）
    pub submit_rating_usecase: Arc<SubmitRatingUseCase>,
    /// UpdateOrderStatusUseCase（注文更新のユースケース）
    pub update_order_status_usecase: Arc<UpdateOrderStatusUseCase>,
    /// QueryUseCase（参照系のユースケース）
    pub query_usecase: Arc<QueryUseCase>,
    /// HTTP API の Bearer トークン解決に使う
    pub principal_resolver: Arc<dyn PrincipalResolver>,
    pub config: ServerConfig,
}
