//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use haiso_shared::time::now_millis;
use serde::Deserialize;
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, sleep_until},
};

use crate::{
    domain::{Connection, ConnectionHandle, ConnectionId, EventPayload, OutboundChannel},
    infrastructure::dto::websocket::{ClientFrame, ControlFrame, parse_client_frame, parse_room},
    ui::state::AppState,
    usecase::{HeartbeatStatus, SubscribeError},
};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // Create a bounded outbound queue and a close signal for this connection
    let (tx, rx) = mpsc::channel(state.config.outbound_buffer);
    let (close_tx, close_rx) = watch::channel(false);
    let reply_tx = tx.clone();

    let connection = match state
        .admit_connection_usecase
        .execute(query.token.as_deref(), ConnectionHandle::new(tx, close_tx))
        .await
    {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!("Rejecting WebSocket connection: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let id = connection.id;
    let state_for_failure = state.clone();
    Ok(ws
        .on_failed_upgrade(move |e| {
            tracing::warn!("WebSocket upgrade for '{}' failed: {}", id, e);
            tokio::spawn(async move {
                state_for_failure
                    .disconnect_connection_usecase
                    .execute(&id)
                    .await;
            });
        })
        .on_upgrade(move |socket| handle_socket(socket, state, connection, rx, reply_tx, close_rx)))
}

/// Spawns a task that receives messages from the rx channel and pushes them to the WebSocket sender.
///
/// Room events and control replies for this connection both arrive through `rx`,
/// so their relative order is preserved.
fn pusher_loop(
    mut rx: mpsc::Receiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Sends `ping` every interval and closes the connection once it has been silent for two.
fn heartbeat_loop(
    state: Arc<AppState>,
    id: ConnectionId,
    outbound: OutboundChannel,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let monitor = state.heartbeat_monitor.clone();
        let mut next_ping = Instant::now() + monitor.interval();

        // Wake for whichever comes first: the next ping or the silence deadline
        loop {
            match monitor.check(&id).await {
                HeartbeatStatus::Alive { remaining } => {
                    let now = Instant::now();
                    if now >= next_ping {
                        let ping = ControlFrame::Ping {
                            timestamp: now_millis(),
                        };
                        if !push_control(&outbound, &ping) {
                            break;
                        }
                        next_ping = now + monitor.interval();
                    }
                    sleep_until(next_ping.min(now + remaining)).await;
                }
                HeartbeatStatus::Expired | HeartbeatStatus::Gone => break,
            }
        }
    })
}

/// Queue a control frame for this connection.
///
/// Returns `false` once the outbound queue is closed. A full queue drops the frame.
fn push_control(outbound: &OutboundChannel, frame: &ControlFrame) -> bool {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to encode control frame: {}", e);
            return true;
        }
    };
    match outbound.try_send(json) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!("Outbound queue full; dropping control frame");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    connection: Connection,
    rx: mpsc::Receiver<String>,
    reply_tx: OutboundChannel,
    mut close_rx: watch::Receiver<bool>,
) {
    let id = connection.id;
    let user_id = connection.principal.user_id.to_string();
    let (mut sender, mut receiver) = socket.split();

    state.admit_connection_usecase.open(&id).await;

    // Tell the client who it is before any room traffic
    {
        let connected = ControlFrame::Connected {
            connection_id: id.to_string(),
            user_id: user_id.clone(),
            role: connection.principal.role,
        };
        let sent = match serde_json::to_string(&connected) {
            Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
            Err(e) => {
                tracing::error!("Failed to encode connected frame: {}", e);
                false
            }
        };
        if !sent {
            tracing::warn!("Failed to greet connection '{}' of '{}'", id, user_id);
            state.disconnect_connection_usecase.execute(&id).await;
            return;
        }
    }

    let state_clone = state.clone();
    let reply_for_recv = reply_tx.clone();

    // Spawn a task to receive frames from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", id, e);
                    break;
                }
            };

            // Any inbound traffic counts as liveness
            state_clone.heartbeat_monitor.record_traffic(&id).await;

            match msg {
                Message::Text(text) => {
                    tracing::debug!("Received from '{}': {}", id, text.as_str());
                    if let Some(reply) = handle_text(&state_clone, &id, text.as_str()).await
                        && !push_control(&reply_for_recv, &reply)
                    {
                        break;
                    }
                }
                Message::Binary(data) => {
                    tracing::debug!("Ignoring {} bytes of binary data from '{}'", data.len(), id);
                    let reply = ControlFrame::error("invalid_event", "binary frames are not supported");
                    if !push_control(&reply_for_recv, &reply) {
                        break;
                    }
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", id);
                    break;
                }
                _ => {}
            }
        }
    });

    // Spawn a task to push room events and replies to this client
    let mut send_task = pusher_loop(rx, sender);

    let mut heartbeat_task = heartbeat_loop(state.clone(), id, reply_tx);

    // If any one of the tasks completes, or the registry closes us, abort the rest
    tokio::select! {
        _ = &mut recv_task => {},
        _ = &mut send_task => {},
        _ = &mut heartbeat_task => {},
        _ = close_rx.changed() => {
            tracing::info!("Connection '{}' was closed by the server", id);
        },
    };
    recv_task.abort();
    send_task.abort();
    heartbeat_task.abort();

    state.disconnect_connection_usecase.execute(&id).await;
}

/// Handle one inbound text frame and return the reply for this connection, if any.
async fn handle_text(state: &AppState, id: &ConnectionId, text: &str) -> Option<ControlFrame> {
    let frame = match parse_client_frame(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("Invalid frame from '{}': {}", id, e);
            return Some(ControlFrame::error("invalid_event", e.to_string()));
        }
    };

    let payload = match frame {
        ClientFrame::Subscribe { room_id, room_type } => {
            let result = match parse_room(&room_id, Some(&room_type)) {
                Ok(room) => state.subscribe_room_usecase.subscribe(id, room).await,
                Err(e) => Err(SubscribeError::from(e)),
            };
            return Some(match result {
                Ok(room) => ControlFrame::Subscribed {
                    room_id: room.to_string(),
                },
                Err(e) => ControlFrame::error(e.code(), e.to_string()),
            });
        }
        ClientFrame::Unsubscribe { room_id } => {
            let result = match parse_room(&room_id, None) {
                Ok(room) => state
                    .subscribe_room_usecase
                    .unsubscribe(id, &room)
                    .await
                    .map(|_| room),
                Err(e) => Err(SubscribeError::from(e)),
            };
            return Some(match result {
                Ok(room) => ControlFrame::Unsubscribed {
                    room_id: room.to_string(),
                },
                Err(e) => ControlFrame::error(e.code(), e.to_string()),
            });
        }
        ClientFrame::Ping => {
            return Some(ControlFrame::Pong {
                timestamp: now_millis(),
            });
        }
        ClientFrame::Pong => return None,
        ClientFrame::ChatMessage(payload) => EventPayload::ChatMessage(payload),
        ClientFrame::LocationUpdate(payload) => EventPayload::LocationUpdate(payload),
        ClientFrame::PresenceUpdate(payload) => EventPayload::PresenceUpdate(payload),
    };

    match state.dispatch_event_usecase.dispatch_client(id, payload).await {
        Ok(report) => {
            tracing::debug!(
                "Event from '{}' delivered to {} member(s) of '{}'",
                id,
                report.delivered,
                report.room
            );
            None
        }
        Err(e) => {
            tracing::warn!("Rejected event from '{}': {}", id, e);
            Some(ControlFrame::error(e.code(), e.to_string()))
        }
    }
}
