//! Haiso CLI client.
//!
//! Connects to the Haiso server over WebSocket, keeps room subscriptions
//! across reconnects and submits ratings over HTTP.

pub mod api;
pub mod command;
pub mod error;
pub mod formatter;
pub mod reconnect;
pub mod runner;
pub mod session;
pub mod ui;
