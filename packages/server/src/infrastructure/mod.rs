//! Infrastructure layer
//!
//! ドメイン層が定義する trait の具体的な実装と、ワイヤフォーマット（DTO）を提供する層。

pub mod dto;
pub mod principal;
pub mod registry;
pub mod repository;
pub mod router;
