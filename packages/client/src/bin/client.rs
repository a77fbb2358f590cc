//! Interactive Haiso client with room subscription replay.
//!
//! Reads commands from stdin (`/help` lists them), reconnects with a linear
//! backoff when the connection drops and re-subscribes every room it was in.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin haiso-client -- --token t-c1 --room order:42
//! cargo run --bin haiso-client -- -t t-d1 -r driver_location:d1 --max-attempts 10
//! ```

use std::time::Duration;

use clap::Parser;
use haiso_client::{
    reconnect::{ReconnectPolicy, ReconnectionController, Subscriptions},
    runner::run_client,
    session::WebSocketTransport,
    ui::PROMPT,
};
use haiso_server::domain::RoomKey;
use haiso_shared::logger::setup_logger;
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "haiso-client")]
#[command(about = "Haiso realtime client with reconnection and room replay", long_about = None)]
struct Args {
    /// Bearer token identifying the user
    #[arg(short = 't', long)]
    token: String,

    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Room to join on connect (repeatable)
    #[arg(short = 'r', long = "room")]
    rooms: Vec<RoomKey>,

    /// Delay before the first reconnect; attempt n waits n times this
    #[arg(long, default_value_t = 1000)]
    base_interval_ms: u64,

    /// Consecutive failed attempts before giving up
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,
}

/// Spawn a blocking thread for rustyline (synchronous readline)
///
/// The thread outlives individual connections; the channel closes on Ctrl+C or Ctrl+D.
fn spawn_readline() -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    // Initialize dependencies in order
    // 1. Reconnection Controller, seeded with the rooms to join
    let policy = ReconnectPolicy::new(
        Duration::from_millis(args.base_interval_ms),
        args.max_attempts,
    );
    let mut controller = ReconnectionController::new(policy, Subscriptions::new(args.rooms));

    // 2. Input
    let input = spawn_readline();

    // 3. Transport
    let mut transport = WebSocketTransport::new(args.url, args.token, input);

    // Run the client
    if let Err(e) = run_client(&mut transport, &mut controller).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
