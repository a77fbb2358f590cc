//! UseCase 層のエラー定義
//!
//! 各エラーは機械可読な `code()` を持ち、WebSocket のエラーフレームと
//! HTTP の拒否レスポンスにそのまま使われます。

use thiserror::Error;

use crate::domain::{
    AuthError, ConnectionId, EventValidationError, OrderId, RepositoryError, RoomKey,
    ValueObjectError,
};

/// 接続受付のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmitError {
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),
}

impl AdmitError {
    pub fn code(&self) -> &'static str {
        match self {
            AdmitError::Authentication(_) => "authentication_failed",
        }
    }
}

/// Room subscription errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    #[error("connection '{0}' is not registered")]
    UnknownConnection(ConnectionId),

    #[error("invalid room: {0}")]
    InvalidRoom(#[from] ValueObjectError),

    #[error("not allowed to subscribe to room '{0}'")]
    Forbidden(RoomKey),

    #[error("order store unavailable: {0}")]
    Repository(#[from] RepositoryError),
}

impl SubscribeError {
    pub fn code(&self) -> &'static str {
        match self {
            SubscribeError::UnknownConnection(_) => "unknown_connection",
            SubscribeError::InvalidRoom(_) => "invalid_room",
            SubscribeError::Forbidden(_) => "forbidden",
            SubscribeError::Repository(_) => "unavailable",
        }
    }
}

/// イベント配送のエラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("connection '{0}' is not registered")]
    UnknownConnection(ConnectionId),

    #[error("invalid event: {0}")]
    InvalidEvent(#[from] EventValidationError),

    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl DispatchError {
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::UnknownConnection(_) => "unknown_connection",
            DispatchError::InvalidEvent(_) => "invalid_event",
            DispatchError::Forbidden(_) => "forbidden",
        }
    }
}

/// 評価送信のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RatingError {
    #[error("invalid rating: {0}")]
    InvalidRating(String),

    #[error("order '{0}' is not eligible for rating")]
    OrderNotEligible(OrderId),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("order '{order_id}' was already rated by '{rater_id}'")]
    DuplicateRating { order_id: String, rater_id: String },

    #[error("rating store unavailable: {0}")]
    Repository(RepositoryError),
}

impl RatingError {
    pub fn code(&self) -> &'static str {
        match self {
            RatingError::InvalidRating(_) => "invalid_rating",
            RatingError::OrderNotEligible(_) => "order_not_eligible",
            RatingError::Forbidden(_) => "forbidden",
            RatingError::DuplicateRating { .. } => "duplicate_rating",
            RatingError::Repository(_) => "unavailable",
        }
    }
}

/// 注文更新のエラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("order '{0}' not found")]
    NotFound(OrderId),

    #[error("invalid order: {0}")]
    InvalidOrder(#[from] ValueObjectError),

    #[error("order store unavailable: {0}")]
    Repository(RepositoryError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl OrderError {
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::NotFound(_) => "order_not_found",
            OrderError::InvalidOrder(_) => "invalid_order",
            OrderError::Repository(_) => "unavailable",
            OrderError::Dispatch(e) => e.code(),
        }
    }
}
