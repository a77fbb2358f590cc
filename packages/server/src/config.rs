//! Server configuration.

use std::time::Duration;

use crate::domain::ReputationPolicy;

/// サーバー全体の設定
///
/// `bin/server.rs` のコマンドライン引数から組み立てられ、各コンポーネントに明示的に渡される。
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// ping の送信間隔。無通信が `2 × heartbeat_interval` 続いた接続は切断される
    pub heartbeat_interval: Duration,
    /// 1 メンバーあたりの送信タイムアウト
    pub outbound_timeout: Duration,
    /// 接続ごとの送信キューの長さ
    pub outbound_buffer: usize,
    pub reputation: ReputationPolicy,
}

impl ServerConfig {
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_OUTBOUND_TIMEOUT: Duration = Duration::from_millis(5000);
    pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: Self::DEFAULT_PORT,
            heartbeat_interval: Duration::from_secs(30),
            outbound_timeout: Self::DEFAULT_OUTBOUND_TIMEOUT,
            outbound_buffer: Self::DEFAULT_OUTBOUND_BUFFER,
            reputation: ReputationPolicy::default(),
        }
    }
}
