//! HTTP and WebSocket handlers.

mod http;
mod websocket;

pub use http::{
    debug_rooms, get_aggregate, health_check, submit_rating, update_order_status, upsert_order,
};
pub use websocket::websocket_handler;
