//! インメモリ Repository 実装

pub mod order;
pub mod rating;

pub use order::InMemoryOrderRepository;
pub use rating::InMemoryRatingRepository;
