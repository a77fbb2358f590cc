//! Helpers for in-process integration tests.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use haiso_server::{
    config::ServerConfig,
    infrastructure::{
        principal::StaticPrincipalResolver,
        repository::{InMemoryOrderRepository, InMemoryRatingRepository},
    },
    ui::Server,
};
use haiso_shared::time::SystemClock;
use serde_json::{Value, json};
use tokio::{net::TcpStream, sync::oneshot, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

pub const PRINCIPALS: &str = r#"[
    { "token": "t-c1", "userId": "c1", "role": "customer" },
    { "token": "t-c2", "userId": "c2", "role": "customer" },
    { "token": "t-m1", "userId": "m1", "role": "merchant" },
    { "token": "t-d1", "userId": "d1", "role": "driver" },
    { "token": "t-root", "userId": "root", "role": "admin" }
]"#;

const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Helper struct to manage an in-process server lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    /// Start a test server on an ephemeral port
    pub async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    pub async fn start_with(config: ServerConfig) -> Self {
        let resolver = StaticPrincipalResolver::from_json(PRINCIPALS).unwrap();
        let server = Server::new(
            config,
            Arc::new(resolver),
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(InMemoryRatingRepository::new()),
            Arc::new(SystemClock),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async {
            let _ = shutdown_rx.await;
        }));

        TestServer {
            addr,
            shutdown: Some(shutdown),
            handle,
        }
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Seed an order through the HTTP surface
    pub async fn put_order(&self, order_id: &str, driver: Option<&str>, status: &str) {
        let response = reqwest::Client::new()
            .put(self.http_url(&format!("/api/orders/{order_id}")))
            .json(&json!({
                "customerId": "c1",
                "merchantId": "m1",
                "driverId": driver,
                "status": status,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    pub async fn health(&self) -> Value {
        reqwest::get(self.http_url("/api/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.handle.abort();
    }
}

/// Helper struct wrapping a raw WebSocket connection
pub struct TestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pub connected: Value,
}

impl TestClient {
    /// Connect and consume the `connected` greeting
    pub async fn connect(server: &TestServer, token: &str) -> Self {
        let (stream, _response) = connect_async(server.ws_url(token)).await.unwrap();
        let mut client = TestClient {
            stream,
            connected: Value::Null,
        };
        let connected = client.next_json().await;
        assert_eq!(connected["type"], "connected");
        client.connected = connected;
        client
    }

    pub async fn send_json(&mut self, value: Value) {
        self.stream
            .send(Message::Text(value.to_string().into()))
            .await
            .unwrap();
    }

    /// Next JSON text frame, skipping heartbeat pings
    pub async fn next_json(&mut self) -> Value {
        loop {
            let frame = tokio::time::timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = frame {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                if value["type"] != "ping" {
                    return value;
                }
            }
        }
    }

    /// Subscribe and wait for the acknowledgement
    pub async fn subscribe(&mut self, room_id: &str) -> Value {
        let room_type = room_id.split(':').next().unwrap_or_default();
        self.send_json(json!({"type": "subscribe", "roomId": room_id, "roomType": room_type}))
            .await;
        self.next_json().await
    }

    /// Assert that nothing but heartbeat traffic arrives within `wait`
    pub async fn expect_silence(&mut self, wait: Duration) {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Err(_) => return,
                Ok(Some(Ok(Message::Text(text)))) => {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap();
                    assert_eq!(value["type"], "ping", "unexpected frame: {value}");
                }
                Ok(Some(Ok(_))) => {}
                Ok(other) => panic!("connection ended unexpectedly: {other:?}"),
            }
        }
    }

    /// Read until the server closes the connection
    pub async fn wait_closed(&mut self, wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Err(_) => return false,
                Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => {}
            }
        }
    }

    /// Answer every heartbeat ping with a pong for `wait`
    pub async fn answer_pings(&mut self, wait: Duration) {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Err(_) => return,
                Ok(Some(Ok(Message::Text(text)))) => {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap();
                    if value["type"] == "ping" {
                        self.send_json(json!({"type": "pong"})).await;
                    }
                }
                Ok(Some(Ok(_))) => {}
                Ok(other) => panic!("connection ended unexpectedly: {other:?}"),
            }
        }
    }
}
