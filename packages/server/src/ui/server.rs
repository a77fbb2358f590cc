//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{get, post, put},
};
use haiso_shared::time::Clock;
use tower_http::trace::TraceLayer;

use crate::{
    config::ServerConfig,
    domain::{OrderRepository, PrincipalResolver, RatingRepository},
    infrastructure::{registry::InMemoryConnectionRegistry, router::InMemoryRoomRouter},
    usecase::{
        AdmitConnectionUseCase, DisconnectConnectionUseCase, DispatchEventUseCase,
        HeartbeatMonitor, QueryUseCase, SubmitRatingUseCase, SubscribeRoomUseCase,
        UpdateOrderStatusUseCase,
    },
};

use super::{
    handler::{
        debug_rooms, get_aggregate, health_check, submit_rating, update_order_status,
        upsert_order, websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Haiso real-time server
///
/// Registry と Router はプロセス内に 1 つだけ作られ、全ユースケースに注入される。
///
/// # Example
///
/// ```ignore
/// let server = Server::new(config, resolver, orders, ratings, Arc::new(SystemClock));
/// server.run().await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    /// Create a new Server instance
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `principal_resolver` - Token → principal collaborator
    /// * `orders` - Order lookup used for room authorization and rating eligibility
    /// * `ratings` - Rating store
    /// * `clock` - Time source for timestamps and heartbeat expiry
    pub fn new(
        config: ServerConfig,
        principal_resolver: Arc<dyn PrincipalResolver>,
        orders: Arc<dyn OrderRepository>,
        ratings: Arc<dyn RatingRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // Initialize dependencies in order:
        // 1. Registry
        // 2. Router
        // 3. UseCases
        // 4. AppState

        // 1. Connection Registry
        let registry = Arc::new(InMemoryConnectionRegistry::new());

        // 2. Room Router
        let router = Arc::new(InMemoryRoomRouter::new(
            registry.clone(),
            config.outbound_timeout,
        ));

        // 3. UseCases
        let admit_connection_usecase = Arc::new(AdmitConnectionUseCase::new(
            principal_resolver.clone(),
            registry.clone(),
            clock.clone(),
        ));
        let disconnect_connection_usecase = Arc::new(DisconnectConnectionUseCase::new(
            registry.clone(),
            router.clone(),
        ));
        let subscribe_room_usecase = Arc::new(SubscribeRoomUseCase::new(
            registry.clone(),
            router.clone(),
            orders.clone(),
        ));
        let dispatch_event_usecase = Arc::new(DispatchEventUseCase::new(
            registry.clone(),
            router.clone(),
            clock.clone(),
        ));
        let heartbeat_monitor = Arc::new(HeartbeatMonitor::new(
            registry.clone(),
            disconnect_connection_usecase.clone(),
            clock.clone(),
            config.heartbeat_interval,
        ));
        let submit_rating_usecase = Arc::new(SubmitRatingUseCase::new(
            orders.clone(),
            ratings.clone(),
            dispatch_event_usecase.clone(),
            config.reputation,
            clock,
        ));
        let update_order_status_usecase = Arc::new(UpdateOrderStatusUseCase::new(
            orders,
            dispatch_event_usecase.clone(),
        ));
        let query_usecase = Arc::new(QueryUseCase::new(registry, router, ratings));

        // 4. AppState
        let state = Arc::new(AppState {
            admit_connection_usecase,
            disconnect_connection_usecase,
            subscribe_room_usecase,
            dispatch_event_usecase,
            heartbeat_monitor,
            submit_rating_usecase,
            update_order_status_usecase,
            query_usecase,
            principal_resolver,
            config,
        });

        Self { state }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Run the server until Ctrl+C or SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the configured address or
    /// if there's an error during server execution.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = self.state.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!("Haiso server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws?token=<token>", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        axum::serve(listener, build_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Define handlers
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket エンドポイント
        .route("/ws", get(websocket_handler))
        // HTTP エンドポイント
        .route("/api/health", get(health_check))
        .route("/debug/rooms", get(debug_rooms))
        .route("/api/orders/{order_id}", put(upsert_order))
        .route("/api/orders/{order_id}/status", post(update_order_status))
        .route("/api/ratings", post(submit_rating))
        .route("/api/users/{user_id}/aggregate", get(get_aggregate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
