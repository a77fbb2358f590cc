//! Message formatting utilities for client display.

use chrono::{DateTime, Local};
use haiso_server::{
    domain::EventType,
    infrastructure::dto::{
        http::SubmitRatingResponse,
        websocket::{ControlFrame, EventFrame},
    },
};
use serde_json::Value;

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a control frame
    ///
    /// # Returns
    ///
    /// `None` for heartbeat frames, which are never shown
    pub fn format_control(frame: &ControlFrame) -> Option<String> {
        match frame {
            ControlFrame::Connected { user_id, role, .. } => {
                Some(format!("\n* connected as {} ({})\n", user_id, role))
            }
            ControlFrame::Subscribed { room_id } => Some(format!("\n+ joined {}\n", room_id)),
            ControlFrame::Unsubscribed { room_id } => Some(format!("\n- left {}\n", room_id)),
            ControlFrame::Error { code, message } => Some(Self::format_rejection(code, message)),
            ControlFrame::Ping { .. } | ControlFrame::Pong { .. } => None,
        }
    }

    /// Format a room event
    ///
    /// # Arguments
    ///
    /// * `frame` - The event envelope received from a room
    ///
    /// # Returns
    ///
    /// A formatted string with the event
    pub fn format_event(frame: &EventFrame) -> String {
        let at = format_time(frame.timestamp);
        let room = frame.room_id.as_deref().unwrap_or("-");
        let from = frame.source_user_id.as_deref().unwrap_or("system");
        let p = &frame.payload;

        let body = match frame.event_type {
            EventType::ChatMessage => format!("@{}: {}", from, text(p, "message")),
            EventType::LocationUpdate => format!(
                "{} is at ({}, {})",
                from,
                p["latitude"], p["longitude"]
            ),
            EventType::OrderUpdate => {
                format!("order {} is now {}", text(p, "orderId"), text(p, "status"))
            }
            EventType::RatingSubmitted => format!(
                "new rating for order {}: {}/5",
                text(p, "orderId"),
                p["score"]
            ),
            EventType::AggregateUpdated => format!(
                "{} average {:.2} over {} rating(s)",
                text(p, "ratedPartyId"),
                p["average"].as_f64().unwrap_or_default(),
                p["count"]
            ),
            EventType::PresenceUpdate => format!("{} is {}", from, text(p, "status")),
            EventType::Ping | EventType::Pong => frame.event_type.as_str().to_string(),
        };

        format!("\n[{}] {} | {}\n", room, body, at)
    }

    /// Format a structured rejection as an actionable message
    ///
    /// # Arguments
    ///
    /// * `code` - Machine-readable error code
    /// * `message` - Server-provided detail
    pub fn format_rejection(code: &str, message: &str) -> String {
        let hint = match code {
            "duplicate_rating" => "You have already rated this order.",
            "order_not_eligible" => "Orders can be rated once delivered or completed.",
            "forbidden" => "You are not allowed to do that here.",
            "invalid_event" | "invalid_room" | "invalid_rating" => "Check the input and try again.",
            "authentication_failed" => "Your token was refused; check --token.",
            _ => "Request failed.",
        };
        format!("\n! {} ({}: {})\n", hint, code, message)
    }

    /// Format the result of `/rate`
    pub fn format_rating_receipt(response: &SubmitRatingResponse) -> String {
        let mut output = format!(
            "\n* rated {} {}/5 for order {}; new average {:.2} over {}\n",
            response.rating.rated_party_id,
            response.rating.score,
            response.rating.order_id,
            response.aggregate.average,
            response.aggregate.count
        );
        if response.admin_alerted {
            output.push_str("* admins were alerted about a low driver rating\n");
        }
        output
    }

    /// Format a raw text message (when parsing fails)
    pub fn format_raw_message(text: &str) -> String {
        format!("\n← Received: {}\n", text)
    }
}

fn text<'a>(payload: &'a Value, field: &str) -> &'a str {
    payload[field].as_str().unwrap_or("?")
}

fn format_time(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(event_type: EventType, payload: Value, source: Option<&str>, room: &str) -> EventFrame {
        EventFrame {
            event_type,
            payload,
            timestamp: 0,
            source_user_id: source.map(str::to_string),
            room_id: Some(room.to_string()),
        }
    }

    #[test]
    fn test_format_chat_message() {
        // テスト項目: チャットメッセージに送信者とルームが表示される
        // given (前提条件):
        let frame = frame(
            EventType::ChatMessage,
            json!({"roomId": "7", "message": "hello"}),
            Some("c1"),
            "chat:7",
        );

        // when (操作):
        let result = MessageFormatter::format_event(&frame);

        // then (期待する結果):
        assert!(result.contains("[chat:7]"));
        assert!(result.contains("@c1: hello"));
    }

    #[test]
    fn test_format_system_event_without_source() {
        // テスト項目: 送信者のないシステムイベントは内容だけを表示する
        // given (前提条件):
        let frame = frame(
            EventType::OrderUpdate,
            json!({"orderId": "42", "status": "in_transit"}),
            None,
            "order:42",
        );

        // when (操作):
        let result = MessageFormatter::format_event(&frame);

        // then (期待する結果):
        assert!(result.contains("order 42 is now in_transit"));
    }

    #[test]
    fn test_format_aggregate_update() {
        // テスト項目: 集計更新は平均を小数 2 桁で表示する
        // given (前提条件):
        let frame = frame(
            EventType::AggregateUpdated,
            json!({"ratedPartyId": "d1", "average": 3.5, "count": 4}),
            None,
            "user:d1",
        );

        // when (操作):
        let result = MessageFormatter::format_event(&frame);

        // then (期待する結果):
        assert!(result.contains("d1 average 3.50 over 4 rating(s)"));
    }

    #[test]
    fn test_business_rejection_is_actionable() {
        // テスト項目: 重複評価の拒否は具体的な案内として表示される
        // given (前提条件):
        let code = "duplicate_rating";

        // when (操作):
        let result = MessageFormatter::format_rejection(code, "order '42' was already rated");

        // then (期待する結果):
        assert!(result.contains("You have already rated this order."));
        assert!(result.contains("duplicate_rating"));
    }

    #[test]
    fn test_heartbeat_frames_are_hidden() {
        // テスト項目: ping / pong は表示しない
        // given (前提条件):
        let ping = ControlFrame::Ping { timestamp: 1 };

        // when (操作):
        let result = MessageFormatter::format_control(&ping);

        // then (期待する結果):
        assert_eq!(result, None);
    }
}
