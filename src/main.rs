//! darkchat server binary
//!
//! Run with: darkchat [--bind ADDR] [--max-connections N] [--secret-hex HEX]
//!
//! Then open http://localhost:1337/register in a browser.
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use darkchat::server::config::DEFAULT_PORT;
use darkchat::session::SessionKeys;
use darkchat::{ChatServer, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "darkchat", version, about = "Streaming HTML chat server")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))]
    bind: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Hex-encoded token signing secret (random per process if omitted)
    #[arg(long)]
    secret_hex: Option<String>,
}

#[tokio::main]
async fn main() -> darkchat::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::with_addr(args.bind).max_connections(args.max_connections);
    if let Some(secret) = &args.secret_hex {
        config = config.session_keys(SessionKeys::from_hex(secret)?);
    }

    let server = ChatServer::new(config);
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
