//! Conversion logic between DTOs and domain entities.

use haiso_shared::time::millis_to_rfc3339;

use crate::domain::{
    AggregateScore, Event, EventPayload, EventValidationError, Order, OrderId, Rating, RoomKey,
    Timestamp, UserId, ValueObjectError,
};
use crate::infrastructure::dto::{http, websocket as ws};

// ========================================
// DTO → Domain Entity
// ========================================

impl TryFrom<ws::EventFrame> for Event {
    type Error = EventValidationError;

    fn try_from(frame: ws::EventFrame) -> Result<Self, Self::Error> {
        let payload = EventPayload::from_json_value(frame.event_type, frame.payload)
            .map_err(|e| EventValidationError::Malformed(e.to_string()))?
            .ok_or_else(|| {
                EventValidationError::Malformed(format!(
                    "'{}' is not a room event",
                    frame.event_type.as_str()
                ))
            })?;
        let source_user_id = frame
            .source_user_id
            .map(UserId::new)
            .transpose()
            .map_err(|e| EventValidationError::Malformed(e.to_string()))?;
        let room = frame
            .room_id
            .map(|r| r.parse::<RoomKey>())
            .transpose()
            .map_err(|e| EventValidationError::Malformed(e.to_string()))?;

        Ok(Event {
            payload,
            timestamp: Timestamp::new(frame.timestamp),
            source_user_id,
            room,
        })
    }
}

/// Build an order record from the `PUT /api/orders/{order_id}` body.
pub fn order_from_request(
    order_id: String,
    request: http::UpsertOrderRequest,
) -> Result<Order, ValueObjectError> {
    Ok(Order {
        id: OrderId::new(order_id)?,
        customer_id: UserId::new(request.customer_id)?,
        merchant_id: UserId::new(request.merchant_id)?,
        driver_id: request.driver_id.map(UserId::new).transpose()?,
        status: request.status,
    })
}

// ========================================
// Domain Entity → DTO
// ========================================

impl TryFrom<&Event> for ws::EventFrame {
    type Error = serde_json::Error;

    fn try_from(event: &Event) -> Result<Self, Self::Error> {
        Ok(Self {
            event_type: event.event_type(),
            payload: event.payload.to_json_value()?,
            timestamp: event.timestamp.value(),
            source_user_id: event.source_user_id.as_ref().map(|u| u.to_string()),
            room_id: event.room.as_ref().map(|r| r.to_string()),
        })
    }
}

/// Encode an event into the text frame sent to subscribers.
pub fn encode_event(event: &Event) -> Result<String, serde_json::Error> {
    let frame = ws::EventFrame::try_from(event)?;
    serde_json::to_string(&frame)
}

impl From<Order> for http::OrderDto {
    fn from(model: Order) -> Self {
        Self {
            order_id: model.id.to_string(),
            customer_id: model.customer_id.into_string(),
            merchant_id: model.merchant_id.into_string(),
            driver_id: model.driver_id.map(UserId::into_string),
            status: model.status,
        }
    }
}

impl From<Rating> for http::RatingDto {
    fn from(model: Rating) -> Self {
        Self {
            order_id: model.order_id.to_string(),
            rater_id: model.rater_id.into_string(),
            rated_party_id: model.rated_party_id.into_string(),
            score: model.score.value(),
            comment: model.comment,
            created_at: millis_to_rfc3339(model.created_at.value()),
        }
    }
}

impl From<AggregateScore> for http::AggregateDto {
    fn from(model: AggregateScore) -> Self {
        Self {
            rated_party_id: model.rated_party_id.into_string(),
            average: model.average,
            count: model.count,
        }
    }
}
