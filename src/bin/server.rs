//! WebSocket chat fan-out server over a Redis pub/sub bus.
//!
//! Clients join a room via `ws://host:port/ws/room/{room}`; every published
//! message round-trips through Redis so fan-out works across processes.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin server
//! cargo run --bin server -- --host 0.0.0.0 --port 3000 --redis-url redis://redis:6379/0
//! ```

use std::time::Duration;

use clap::Parser;
use roomcast::{common::logger::setup_logger, config::Settings, server::run_server};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "WebSocket chat fan-out server backed by Redis pub/sub", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Redis connection URI
    #[arg(long, default_value = "redis://127.0.0.1:6379/0")]
    redis_url: String,

    /// Prefix of the Redis channels carrying room traffic
    #[arg(long, default_value = "room:")]
    channel_prefix: String,

    /// Text frame treated as a client heartbeat
    #[arg(long, default_value = "ping")]
    heartbeat_ping: String,

    /// Text frame replied to a heartbeat
    #[arg(long, default_value = "pong")]
    heartbeat_pong: String,

    /// Seconds to wait between Redis reconnection attempts
    #[arg(long, default_value = "5")]
    retry_delay: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    let settings = Settings {
        redis_url: args.redis_url,
        channel_prefix: args.channel_prefix,
        heartbeat_ping: args.heartbeat_ping,
        heartbeat_pong: args.heartbeat_pong,
        retry_delay: Duration::from_secs(args.retry_delay),
    };

    if let Err(e) = run_server(args.host, args.port, settings).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
