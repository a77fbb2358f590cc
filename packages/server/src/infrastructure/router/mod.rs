//! Room Router の実装
//!
//! - `inmemory`: プロセス内の送信キューへファンアウトする実装
//! - 複数プロセス間の配送は扱わない

pub mod inmemory;

pub use inmemory::InMemoryRoomRouter;
