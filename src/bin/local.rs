//! Veilsocks local
//!
//! Runs the local SOCKS5 listener and relays every connection to the
//! configured remote server over an encrypted tunnel.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use veilsocks::crypto::derive_key;
use veilsocks::relay::{self, RelayContext};
use veilsocks::Config;

/// Veilsocks Local - SOCKS5 front-end for the encrypted relay
#[derive(Parser, Debug)]
#[command(name = "veilsocks-local")]
#[command(about = "Local SOCKS5 proxy that tunnels traffic to a veilsocks relay")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(args.log_level.as_str())
        .init();

    // Load configuration
    let config = Config::load(&args.config).context("Failed to load configuration")?;

    // The key is a pure function of the passphrase; derive it once and share
    // it read-only across connections.
    let ctx = Arc::new(RelayContext {
        server: config.server.clone(),
        server_port: config.server_port,
        key: derive_key(&config.password),
    });

    let listener = TcpListener::bind(config.local_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.local_addr()))?;

    info!("Veilsocks Local v{}", veilsocks::VERSION);
    info!("SOCKS5 listener on {}", config.local_addr());
    info!("Relay server: {}", config.server_addr());

    // Run until interrupted; dropping the listener and the runtime tears
    // down all in-flight connections.
    tokio::select! {
        res = relay::serve(listener, ctx) => {
            res.context("Listener failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
