//! WebSocket message DTOs.
//!
//! Every frame is a JSON text message tagged by `type`; field names are
//! camelCase.

use serde::{Deserialize, Serialize};

use crate::domain::{
    ChatMessagePayload, EventType, EventValidationError, LocationUpdatePayload, Origin,
    PresenceUpdatePayload, Role, RoomKey, RoomType, ValueObjectError,
};

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    Subscribe { room_id: String, room_type: String },
    Unsubscribe { room_id: String },
    Ping,
    Pong,
    ChatMessage(ChatMessagePayload),
    LocationUpdate(LocationUpdatePayload),
    PresenceUpdate(PresenceUpdatePayload),
}

impl ClientFrame {
    pub fn subscribe(room: &RoomKey) -> Self {
        ClientFrame::Subscribe {
            room_id: room.to_string(),
            room_type: room.room_type().as_str().to_string(),
        }
    }

    pub fn unsubscribe(room: &RoomKey) -> Self {
        ClientFrame::Unsubscribe {
            room_id: room.to_string(),
        }
    }
}

/// Parse an inbound text frame.
///
/// System-originated event types are rejected before payload decoding so the
/// sender gets a precise error.
pub fn parse_client_frame(text: &str) -> Result<ClientFrame, EventValidationError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| EventValidationError::Malformed(e.to_string()))?;

    let type_name = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| EventValidationError::Malformed("missing 'type'".to_string()))?;

    if let Some(event_type) = EventType::from_wire(type_name)
        && event_type.origin() == Origin::System
    {
        return Err(EventValidationError::NotClientOriginated(
            event_type.as_str(),
        ));
    }

    serde_json::from_value(value).map_err(|e| EventValidationError::Malformed(e.to_string()))
}

/// Resolve a control frame's `roomId` / `roomType` pair into a room key.
///
/// `room_type` is optional for `unsubscribe`; when present it must match.
pub fn parse_room(room_id: &str, room_type: Option<&str>) -> Result<RoomKey, ValueObjectError> {
    let room: RoomKey = room_id.parse()?;
    if let Some(room_type) = room_type {
        let expected: RoomType = room_type.parse()?;
        if expected != room.room_type() {
            return Err(ValueObjectError::MalformedRoomKey(room_id.to_string()));
        }
    }
    Ok(room)
}

/// Room event envelope pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrame {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

/// Server → client control frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ControlFrame {
    Connected {
        connection_id: String,
        user_id: String,
        role: Role,
    },
    Subscribed {
        room_id: String,
    },
    Unsubscribed {
        room_id: String,
    },
    Ping {
        timestamp: i64,
    },
    Pong {
        timestamp: i64,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ControlFrame {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ControlFrame::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Anything the server may send.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Control(ControlFrame),
    Event(EventFrame),
}

impl ServerFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<ControlFrame>(text) {
            Ok(control) => Ok(ServerFrame::Control(control)),
            Err(_) => serde_json::from_str::<EventFrame>(text).map(ServerFrame::Event),
        }
    }
}
