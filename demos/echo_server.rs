//! Echo server.
//!
//! Demonstrates:
//! - Binding a server with a tuned upgrader
//! - Echoing every binary message back through the outbound queue
//! - Reacting to a full send buffer
//!
//! Usage:
//!   cargo run --example echo_server
//!   cargo run --example echo_server -- --debug
//!   cargo run --example echo_server -- --port 9001

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use bytes::Bytes;
use duplex_socket::{Connection, ConnectionConfig, Error, Server, Upgrader, UpgraderConfig};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_PORT: u16 = 9001;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    port: u16,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let port = args
            .iter()
            .position(|a| a == "--port")
            .and_then(|i| args.get(i + 1))
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            port,
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== Echo Server ===\n");

    let connection_config = ConnectionConfig::new()
        .with_pong_wait(Duration::from_secs(30))
        .with_max_message_size(64 * 1024);
    let upgrader = Upgrader::new(
        UpgraderConfig::new()
            .with_handshake_timeout(Duration::from_secs(10))
            .with_connection(connection_config),
    );

    let server = Server::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), args.port, upgrader).await?;
    println!("[Server] Listening on {}", server.ws_url());
    println!("         Press Ctrl+C to exit\n");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            accepted = accept_echo(&server) => {
                if let Err(e) = accepted {
                    println!("[Client] Rejected: {e}");
                }
            }
        }
    }

    println!("\n=== Done ===");
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Accepts one client and starts echoing for it.
async fn accept_echo(server: &Server) -> duplex_socket::Result<()> {
    // The handler runs before the connection handle exists, so inbound
    // payloads are relayed through a channel.
    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    let connection = server
        .accept(move |payload: Bytes| {
            let _ = tx.send(payload);
        })
        .await?;

    println!("[Client] {} connected", connection.id());
    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if !echo(&connection, payload) {
                break;
            }
        }
        connection.closed().await;
        println!("[Client] {} disconnected", connection.id());
    });

    Ok(())
}

/// Returns `false` once the connection can no longer accept messages.
fn echo(connection: &Connection, payload: Bytes) -> bool {
    match connection.enqueue(payload) {
        Ok(()) => true,
        Err(Error::BufferFull { capacity }) => {
            println!("[Client] {} too slow ({capacity} queued), dropped", connection.id());
            false
        }
        Err(_) => false,
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "duplex_socket=debug"
    } else {
        "duplex_socket=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
