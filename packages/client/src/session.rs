//! WebSocket client session management.

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use haiso_server::{
    domain::{ChatMessagePayload, ChatRoomId, LocationUpdatePayload, PresenceUpdatePayload, RoomKey},
    infrastructure::dto::{
        http::SubmitRatingRequest,
        websocket::{ClientFrame, ControlFrame, ServerFrame},
    },
};
use tokio::{net::TcpStream, sync::mpsc, time::timeout};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, protocol::Message},
};

use crate::{
    api::RatingApi,
    command::{Command, HELP, parse_command},
    error::ClientError,
    formatter::MessageFormatter,
    reconnect::{SessionEnd, Subscriptions, Transport},
    ui::{print_block, redisplay_prompt},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long to wait for the server's answer to a subscribe during replay
const SUBSCRIBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// [`Transport`] over a real WebSocket connection
///
/// Input lines arrive on `input` from the readline thread, which outlives
/// individual connections.
pub struct WebSocketTransport {
    url: String,
    token: String,
    stream: Option<WsStream>,
    input: mpsc::UnboundedReceiver<String>,
    api: RatingApi,
    last_chat: Option<ChatRoomId>,
}

impl WebSocketTransport {
    pub fn new(url: String, token: String, input: mpsc::UnboundedReceiver<String>) -> Self {
        let api = RatingApi::new(&url, token.clone());
        Self {
            url,
            token,
            stream: None,
            input,
            api,
            last_chat: None,
        }
    }

    /// Translate a room-level command into a frame
    fn frame_for(&mut self, command: Command) -> Result<ClientFrame, String> {
        match command {
            Command::Join(room) => Ok(ClientFrame::subscribe(&room)),
            Command::Leave(room) => Ok(ClientFrame::unsubscribe(&room)),
            Command::Chat { room_id, message } => {
                self.last_chat = Some(room_id.clone());
                Ok(chat_frame(room_id, message))
            }
            Command::Say(message) => match &self.last_chat {
                Some(room_id) => Ok(chat_frame(room_id.clone(), message)),
                None => Err("join a chat room first (/join chat:<id>)".to_string()),
            },
            Command::Presence(status) => {
                Ok(ClientFrame::PresenceUpdate(PresenceUpdatePayload { status }))
            }
            Command::Location {
                latitude,
                longitude,
            } => Ok(ClientFrame::LocationUpdate(LocationUpdatePayload {
                latitude,
                longitude,
                tracking_type: "gps".to_string(),
                sharing_level: "order_parties".to_string(),
            })),
            Command::Rate { .. } | Command::Help | Command::Quit => {
                Err("not a room command".to_string())
            }
        }
    }

    async fn rate(&self, request: SubmitRatingRequest) {
        match self.api.submit(&request).await {
            Ok(receipt) => print_block(&MessageFormatter::format_rating_receipt(&receipt)),
            Err(ClientError::Rejected { code, message }) => {
                print_block(&MessageFormatter::format_rejection(&code, &message))
            }
            Err(e) => {
                tracing::warn!("Rating request failed: {}", e);
                print_block(&format!("\n! rating not sent: {}\n", e));
            }
        }
    }
}

fn chat_frame(room_id: ChatRoomId, message: String) -> ClientFrame {
    ClientFrame::ChatMessage(ChatMessagePayload {
        room_id,
        message,
        attachments: Vec::new(),
    })
}

fn display(frame: &ServerFrame) {
    let output = match frame {
        ServerFrame::Control(control) => MessageFormatter::format_control(control),
        ServerFrame::Event(event) => Some(MessageFormatter::format_event(event)),
    };
    if let Some(output) = output {
        print_block(&output);
    }
}

async fn send_frame<S>(sink: &mut S, frame: &ClientFrame) -> Result<(), ClientError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(frame).map_err(|e| ClientError::Connection(e.to_string()))?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| ClientError::Connection(e.to_string()))
}

/// Read the next text frame, skipping protocol-level messages
async fn next_text(stream: &mut WsStream) -> Result<String, ClientError> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_string()),
            Some(Ok(Message::Close(_))) | None => {
                return Err(ClientError::Connection("closed by server".to_string()));
            }
            Some(Err(e)) => return Err(ClientError::Connection(e.to_string())),
            Some(Ok(_)) => {}
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&mut self) -> Result<(), ClientError> {
        self.stream = None;
        let url = format!("{}?token={}", self.url, self.token);

        let (mut stream, _response) = match connect_async(url.as_str()).await {
            Ok(result) => result,
            Err(tungstenite::Error::Http(response)) if response.status().as_u16() == 401 => {
                return Err(ClientError::Authentication(format!(
                    "server refused the token ({})",
                    response.status()
                )));
            }
            Err(e) => return Err(ClientError::Connection(e.to_string())),
        };

        // The server greets every admitted connection before anything else
        let greeting = next_text(&mut stream).await?;
        match ServerFrame::parse(&greeting) {
            Ok(frame @ ServerFrame::Control(ControlFrame::Connected { .. })) => display(&frame),
            _ => {
                return Err(ClientError::Connection(format!(
                    "unexpected greeting: {}",
                    greeting
                )));
            }
        }

        tracing::info!("Connected to {}", self.url);
        self.stream = Some(stream);
        Ok(())
    }

    async fn subscribe(&mut self, room: &RoomKey) -> Result<(), ClientError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ClientError::Connection("not connected".to_string()))?;
        send_frame(stream, &ClientFrame::subscribe(room)).await?;

        let expected = room.to_string();
        loop {
            let text = timeout(SUBSCRIBE_TIMEOUT, next_text(stream))
                .await
                .map_err(|_| ClientError::Connection(format!("no answer for '{}'", room)))??;

            match ServerFrame::parse(&text) {
                Ok(ServerFrame::Control(ControlFrame::Subscribed { room_id }))
                    if room_id == expected =>
                {
                    return Ok(());
                }
                Ok(ServerFrame::Control(ControlFrame::Error { code, message })) => {
                    return Err(ClientError::Rejected { code, message });
                }
                Ok(ServerFrame::Control(ControlFrame::Ping { .. })) => {
                    send_frame(stream, &ClientFrame::Pong).await?;
                }
                Ok(frame) => display(&frame),
                Err(_) => print_block(&MessageFormatter::format_raw_message(&text)),
            }
        }
    }

    async fn run_until_closed(&mut self, subscriptions: &mut Subscriptions) -> SessionEnd {
        let Some(stream) = self.stream.take() else {
            return SessionEnd::ConnectionLost("not connected".to_string());
        };
        let (mut write, mut read) = stream.split();
        redisplay_prompt();

        loop {
            tokio::select! {
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Text(text))) => match ServerFrame::parse(text.as_str()) {
                        Ok(ServerFrame::Control(ControlFrame::Ping { .. })) => {
                            if let Err(e) = send_frame(&mut write, &ClientFrame::Pong).await {
                                return SessionEnd::ConnectionLost(e.to_string());
                            }
                        }
                        Ok(frame) => {
                            if let ServerFrame::Control(ControlFrame::Subscribed { room_id }) = &frame
                                && let Ok(room) = room_id.parse::<RoomKey>()
                            {
                                if let RoomKey::Chat(chat) = &room {
                                    self.last_chat = Some(chat.clone());
                                }
                                subscriptions.insert(room);
                            }
                            display(&frame);
                        }
                        Err(_) => print_block(&MessageFormatter::format_raw_message(text.as_str())),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("Server closed the connection");
                        return SessionEnd::ConnectionLost("closed by server".to_string());
                    }
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket read error: {}", e);
                        return SessionEnd::ConnectionLost(e.to_string());
                    }
                    Some(Ok(_)) => {}
                },
                line = self.input.recv() => {
                    let Some(line) = line else {
                        write.close().await.ok();
                        return SessionEnd::UserExit;
                    };

                    let command = match parse_command(&line) {
                        Ok(command) => command,
                        Err(e) => {
                            print_block(&format!("\n! {}\n", e));
                            continue;
                        }
                    };

                    match command {
                        Command::Quit => {
                            write.close().await.ok();
                            return SessionEnd::UserExit;
                        }
                        Command::Help => print_block(&format!("\n{}\n", HELP)),
                        Command::Rate {
                            order_id,
                            rated_party_id,
                            score,
                            comment,
                        } => {
                            self.rate(SubmitRatingRequest {
                                order_id,
                                rated_party_id,
                                score,
                                comment,
                            })
                            .await;
                        }
                        command => {
                            if let Command::Leave(room) = &command {
                                subscriptions.remove(room);
                                if let RoomKey::Chat(chat) = room
                                    && self.last_chat.as_ref() == Some(chat)
                                {
                                    self.last_chat = None;
                                }
                            }
                            match self.frame_for(command) {
                                Ok(frame) => {
                                    if let Err(e) = send_frame(&mut write, &frame).await {
                                        return SessionEnd::ConnectionLost(e.to_string());
                                    }
                                    tracing::debug!("Frame sent");
                                }
                                Err(message) => print_block(&format!("\n! {}\n", message)),
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haiso_server::domain::PresenceStatus;

    fn transport() -> WebSocketTransport {
        let (_tx, rx) = mpsc::unbounded_channel();
        WebSocketTransport::new("ws://127.0.0.1:1/ws".to_string(), "t-c1".to_string(), rx)
    }

    #[test]
    fn test_say_goes_to_last_chat_room() {
        // テスト項目: /chat の後の平文は同じチャットルームに送られる
        // given (前提条件):
        let mut transport = transport();
        let room_id = ChatRoomId::new("7".to_string()).unwrap();
        transport
            .frame_for(Command::Chat {
                room_id: room_id.clone(),
                message: "hi".to_string(),
            })
            .unwrap();

        // when (操作):
        let frame = transport.frame_for(Command::Say("again".to_string()));

        // then (期待する結果):
        assert_eq!(frame, Ok(chat_frame(room_id, "again".to_string())));
    }

    #[test]
    fn test_say_without_chat_room_is_refused() {
        // テスト項目: チャットルーム未参加での平文送信は案内を返す
        // given (前提条件):
        let mut transport = transport();

        // when (操作):
        let frame = transport.frame_for(Command::Say("hello?".to_string()));

        // then (期待する結果):
        assert!(frame.is_err());
    }

    #[test]
    fn test_room_commands_map_to_frames() {
        // テスト項目: ルーム操作とプレゼンス更新がフレームに変換される
        // given (前提条件):
        let mut transport = transport();
        let room: RoomKey = "order:42".parse().unwrap();

        // when (操作):
        let join = transport.frame_for(Command::Join(room.clone()));
        let leave = transport.frame_for(Command::Leave(room.clone()));
        let presence = transport.frame_for(Command::Presence(PresenceStatus::Busy));

        // then (期待する結果):
        assert_eq!(join, Ok(ClientFrame::subscribe(&room)));
        assert_eq!(leave, Ok(ClientFrame::unsubscribe(&room)));
        assert_eq!(
            presence,
            Ok(ClientFrame::PresenceUpdate(PresenceUpdatePayload {
                status: PresenceStatus::Busy
            }))
        );
    }
}
