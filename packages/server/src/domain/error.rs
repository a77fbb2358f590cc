//! ドメイン層のエラー定義

use thiserror::Error;

/// Value Object の生成に失敗した場合のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{kind} must be at most {max} characters")]
    TooLong { kind: &'static str, max: usize },

    #[error("{0} must not contain whitespace or control characters")]
    InvalidCharacter(&'static str),

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("unknown room type '{0}'")]
    UnknownRoomType(String),

    #[error("malformed room key '{0}'")]
    MalformedRoomKey(String),

    #[error("score {0} is outside 1..=5")]
    ScoreOutOfRange(u8),
}

/// Schema violation found while validating an event payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventValidationError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("field '{field}' {reason}")]
    Field {
        field: &'static str,
        reason: String,
    },

    #[error("event type '{0}' cannot be sent by a client")]
    NotClientOriginated(&'static str),

    #[error("event type '{0}' cannot be injected by the system")]
    NotSystemOriginated(&'static str),

    #[error("event type '{event_type}' cannot target room '{room}'")]
    RoomNotPermitted {
        event_type: &'static str,
        room: String,
    },
}

impl EventValidationError {
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Field {
            field,
            reason: reason.into(),
        }
    }
}

/// Repository 操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// `(order_id, rater_id)` の一意制約違反
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Outbound delivery failure for a single connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("connection '{0}' is not registered")]
    ConnectionNotFound(String),

    #[error("outbound queue of connection '{0}' is closed")]
    ChannelClosed(String),

    #[error("outbound queue of connection '{0}' stayed full past the send timeout")]
    Timeout(String),
}

/// プリンシパル解決（認証）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,
}
