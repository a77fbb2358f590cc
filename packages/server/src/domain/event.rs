//! Real-time events
//!
//! The closed set of event types distributed through rooms. Each variant of
//! [`EventPayload`] carries its own strongly typed payload; the wire envelope
//! lives in the infrastructure DTO layer.

use serde::{Deserialize, Serialize};

use super::{
    entity::OrderStatus,
    error::EventValidationError,
    value_object::{ChatRoomId, OrderId, RoomKey, Score, Timestamp, UserId},
};

const MAX_CHAT_MESSAGE_CHARS: usize = 4000;
const MAX_ATTACHMENTS: usize = 10;
const MAX_LABEL_CHARS: usize = 64;

/// Wire-level event type names (case-sensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ChatMessage,
    LocationUpdate,
    OrderUpdate,
    RatingSubmitted,
    AggregateUpdated,
    PresenceUpdate,
    Ping,
    Pong,
}

/// Who may originate an event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Client,
    System,
    Either,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ChatMessage => "chat_message",
            EventType::LocationUpdate => "location_update",
            EventType::OrderUpdate => "order_update",
            EventType::RatingSubmitted => "rating_submitted",
            EventType::AggregateUpdated => "aggregate_updated",
            EventType::PresenceUpdate => "presence_update",
            EventType::Ping => "ping",
            EventType::Pong => "pong",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Some(match name {
            "chat_message" => EventType::ChatMessage,
            "location_update" => EventType::LocationUpdate,
            "order_update" => EventType::OrderUpdate,
            "rating_submitted" => EventType::RatingSubmitted,
            "aggregate_updated" => EventType::AggregateUpdated,
            "presence_update" => EventType::PresenceUpdate,
            "ping" => EventType::Ping,
            "pong" => EventType::Pong,
            _ => return None,
        })
    }

    pub fn origin(&self) -> Origin {
        match self {
            EventType::ChatMessage | EventType::LocationUpdate | EventType::PresenceUpdate => {
                Origin::Client
            }
            EventType::OrderUpdate | EventType::RatingSubmitted | EventType::AggregateUpdated => {
                Origin::System
            }
            EventType::Ping | EventType::Pong => Origin::Either,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    pub room_id: ChatRoomId,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdatePayload {
    pub latitude: f64,
    pub longitude: f64,
    pub tracking_type: String,
    pub sharing_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdatePayload {
    pub order_id: OrderId,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSubmittedPayload {
    pub order_id: OrderId,
    pub rated_party_id: UserId,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateUpdatedPayload {
    pub rated_party_id: UserId,
    pub average: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Offline,
    Busy,
    Away,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdatePayload {
    pub status: PresenceStatus,
}

/// Room-routed event payloads. `ping`/`pong` are connection-local and never
/// appear here.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    ChatMessage(ChatMessagePayload),
    LocationUpdate(LocationUpdatePayload),
    OrderUpdate(OrderUpdatePayload),
    RatingSubmitted(RatingSubmittedPayload),
    AggregateUpdated(AggregateUpdatedPayload),
    PresenceUpdate(PresenceUpdatePayload),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::ChatMessage(_) => EventType::ChatMessage,
            EventPayload::LocationUpdate(_) => EventType::LocationUpdate,
            EventPayload::OrderUpdate(_) => EventType::OrderUpdate,
            EventPayload::RatingSubmitted(_) => EventType::RatingSubmitted,
            EventPayload::AggregateUpdated(_) => EventType::AggregateUpdated,
            EventPayload::PresenceUpdate(_) => EventType::PresenceUpdate,
        }
    }

    /// Schema checks that serde cannot express.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        match self {
            EventPayload::ChatMessage(p) => {
                let chars = p.message.trim().chars().count();
                if chars == 0 {
                    return Err(EventValidationError::field("message", "must not be blank"));
                }
                if chars > MAX_CHAT_MESSAGE_CHARS {
                    return Err(EventValidationError::field(
                        "message",
                        format!("must be at most {MAX_CHAT_MESSAGE_CHARS} characters"),
                    ));
                }
                if p.attachments.len() > MAX_ATTACHMENTS {
                    return Err(EventValidationError::field(
                        "attachments",
                        format!("must contain at most {MAX_ATTACHMENTS} entries"),
                    ));
                }
                if p.attachments.iter().any(|a| a.trim().is_empty()) {
                    return Err(EventValidationError::field(
                        "attachments",
                        "must not contain blank entries",
                    ));
                }
                Ok(())
            }
            EventPayload::LocationUpdate(p) => {
                if !p.latitude.is_finite() || !(-90.0..=90.0).contains(&p.latitude) {
                    return Err(EventValidationError::field(
                        "latitude",
                        "must be within [-90, 90]",
                    ));
                }
                if !p.longitude.is_finite() || !(-180.0..=180.0).contains(&p.longitude) {
                    return Err(EventValidationError::field(
                        "longitude",
                        "must be within [-180, 180]",
                    ));
                }
                validate_label("trackingType", &p.tracking_type)?;
                validate_label("sharingLevel", &p.sharing_level)
            }
            EventPayload::AggregateUpdated(p) => {
                if !p.average.is_finite() || !(0.0..=f64::from(Score::MAX)).contains(&p.average)
                {
                    return Err(EventValidationError::field(
                        "average",
                        "must be within [0, 5]",
                    ));
                }
                Ok(())
            }
            EventPayload::OrderUpdate(_)
            | EventPayload::RatingSubmitted(_)
            | EventPayload::PresenceUpdate(_) => Ok(()),
        }
    }

    /// Default target room. Client events that target the sender's own
    /// channels need the sender id.
    pub fn target_room(&self, source: Option<&UserId>) -> Option<RoomKey> {
        match self {
            EventPayload::ChatMessage(p) => Some(RoomKey::Chat(p.room_id.clone())),
            EventPayload::LocationUpdate(_) => source.cloned().map(RoomKey::DriverLocation),
            EventPayload::OrderUpdate(p) => Some(RoomKey::Order(p.order_id.clone())),
            EventPayload::RatingSubmitted(p) => Some(RoomKey::User(p.rated_party_id.clone())),
            EventPayload::AggregateUpdated(p) => Some(RoomKey::User(p.rated_party_id.clone())),
            EventPayload::PresenceUpdate(_) => source.cloned().map(RoomKey::User),
        }
    }

    /// Whether `room` is a legal destination for this payload.
    pub fn permits_room(&self, room: &RoomKey, source: Option<&UserId>) -> bool {
        if self.target_room(source).as_ref() == Some(room) {
            return true;
        }
        matches!(
            (self, room),
            (EventPayload::AggregateUpdated(_), RoomKey::AdminBroadcast)
        )
    }

    /// Payload body as JSON, without the type tag.
    pub fn to_json_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            EventPayload::ChatMessage(p) => serde_json::to_value(p),
            EventPayload::LocationUpdate(p) => serde_json::to_value(p),
            EventPayload::OrderUpdate(p) => serde_json::to_value(p),
            EventPayload::RatingSubmitted(p) => serde_json::to_value(p),
            EventPayload::AggregateUpdated(p) => serde_json::to_value(p),
            EventPayload::PresenceUpdate(p) => serde_json::to_value(p),
        }
    }

    /// Rebuild a payload from its type tag and JSON body.
    ///
    /// Returns `Ok(None)` for the connection-local `ping`/`pong` types.
    pub fn from_json_value(
        event_type: EventType,
        value: serde_json::Value,
    ) -> Result<Option<Self>, serde_json::Error> {
        let payload = match event_type {
            EventType::ChatMessage => EventPayload::ChatMessage(serde_json::from_value(value)?),
            EventType::LocationUpdate => {
                EventPayload::LocationUpdate(serde_json::from_value(value)?)
            }
            EventType::OrderUpdate => EventPayload::OrderUpdate(serde_json::from_value(value)?),
            EventType::RatingSubmitted => {
                EventPayload::RatingSubmitted(serde_json::from_value(value)?)
            }
            EventType::AggregateUpdated => {
                EventPayload::AggregateUpdated(serde_json::from_value(value)?)
            }
            EventType::PresenceUpdate => {
                EventPayload::PresenceUpdate(serde_json::from_value(value)?)
            }
            EventType::Ping | EventType::Pong => return Ok(None),
        };
        Ok(Some(payload))
    }
}

fn validate_label(field: &'static str, value: &str) -> Result<(), EventValidationError> {
    if value.trim().is_empty() {
        return Err(EventValidationError::field(field, "must not be blank"));
    }
    if value.chars().count() > MAX_LABEL_CHARS {
        return Err(EventValidationError::field(
            field,
            format!("must be at most {MAX_LABEL_CHARS} characters"),
        ));
    }
    Ok(())
}

/// Immutable, routed event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub payload: EventPayload,
    pub timestamp: Timestamp,
    pub source_user_id: Option<UserId>,
    pub room: Option<RoomKey>,
}

impl Event {
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}
