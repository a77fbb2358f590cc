//! Haiso real-time server library.
//!
//! Connection registry, heartbeat monitor, room router and event dispatcher
//! for delivery tracking, plus the rating aggregation pipeline that feeds
//! reputation updates back into rooms.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
