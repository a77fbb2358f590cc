//! Haiso real-time server.
//!
//! Admits authenticated WebSocket connections, routes events into rooms and
//! aggregates ratings.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin haiso-server -- --principals principals.json
//! cargo run --bin haiso-server -- --host 0.0.0.0 --port 3000 --heartbeat-interval-secs 10
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use haiso_server::{
    config::ServerConfig,
    domain::ReputationPolicy,
    infrastructure::{
        principal::StaticPrincipalResolver,
        repository::{InMemoryOrderRepository, InMemoryRatingRepository},
    },
    ui::Server,
};
use haiso_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "haiso-server")]
#[command(about = "Real-time room fan-out and rating aggregation server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value_t = ServerConfig::DEFAULT_PORT)]
    port: u16,

    /// Seconds between heartbeat pings; two silent intervals close the connection
    #[arg(long, default_value_t = 30)]
    heartbeat_interval_secs: u64,

    /// Per-member send timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    outbound_timeout_ms: u64,

    /// Outbound queue length per connection
    #[arg(long, default_value_t = ServerConfig::DEFAULT_OUTBOUND_BUFFER)]
    outbound_buffer: usize,

    /// Drivers whose average falls below this value trigger an admin broadcast
    #[arg(long, default_value_t = ReputationPolicy::DEFAULT_THRESHOLD)]
    low_reputation_threshold: f64,

    /// JSON file of `[{"token", "userId", "role"}]` entries used to resolve tokens
    #[arg(long)]
    principals: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. Config
    // 2. Principal resolver
    // 3. Stores
    // 4. Server

    // 1. Config
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        heartbeat_interval: Duration::from_secs(args.heartbeat_interval_secs.max(1)),
        outbound_timeout: Duration::from_millis(args.outbound_timeout_ms.max(1)),
        outbound_buffer: args.outbound_buffer.max(1),
        reputation: ReputationPolicy::new(args.low_reputation_threshold),
    };

    // 2. Principal resolver (static token table)
    let resolver = match &args.principals {
        Some(path) => match StaticPrincipalResolver::from_file(path) {
            Ok(resolver) => resolver,
            Err(e) => {
                tracing::error!("Failed to load principals from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => StaticPrincipalResolver::default(),
    };
    if resolver.is_empty() {
        tracing::warn!("No principals loaded; every connection will be rejected");
    } else {
        tracing::info!("Loaded {} principal(s)", resolver.len());
    }

    // 3. Stores (in-memory)
    let orders = Arc::new(InMemoryOrderRepository::new());
    let ratings = Arc::new(InMemoryRatingRepository::new());

    // 4. Create and run the server
    let server = Server::new(
        config,
        Arc::new(resolver),
        orders,
        ratings,
        Arc::new(SystemClock),
    );
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
