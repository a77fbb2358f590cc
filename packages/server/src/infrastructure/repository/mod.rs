//! Repository の実装
//!
//! - `inmemory`: HashMap をストアとして使う実装
//! - 将来的に: `postgres` など

pub mod inmemory;

pub use inmemory::{InMemoryOrderRepository, InMemoryRatingRepository};
