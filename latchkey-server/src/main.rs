//! Latchkey licensing and device pairing service.
//!
//! This binary fronts the CLI licensing subsystem: it issues and revokes
//! API keys, mints short-lived offline-capable license assertions, runs
//! the device-link pairing handshake for headless CLIs, and ingests
//! billing webhooks to keep entitlements current.
//!
//! Usage:
//!   latchkey-server --bind 127.0.0.1:8700
//!
//! Per-user state lives in the external profile directory; the only
//! local state is the assertion signing key file.

use anyhow::{Context, Result};
use clap::Parser;
use latchkey_pairing::run_sweeper;
use latchkey_server::{AppState, ServerConfig, build_router};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "latchkey-server")]
#[command(about = "CLI licensing and device pairing service")]
struct Args {
    /// Address to bind the HTTP listener on
    #[arg(short, long, default_value = "127.0.0.1:8700")]
    bind: SocketAddr,

    /// Path to the assertion signing key file
    #[arg(short = 'k', long, default_value = "latchkey-assertion.key")]
    assertion_key: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Latchkey starting...");
    let config = ServerConfig::load(args.bind, &args.assertion_key)?;
    let state = AppState::new(config.directory(), config.sessions(), &config);

    // Reclaims finished and expired pairing codes in the background.
    let _sweeper = run_sweeper(state.links.clone());

    let public_key_b64 = state.assertions.public_key_b64();
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .context("Failed to bind HTTP listener")?;
    info!("Listening on {}", config.bind);

    println!("\n========================================");
    println!("  Latchkey Licensing Service");
    println!("========================================");
    println!("  Bind:       {}", config.bind);
    println!("  Public URL: {}", config.public_url);
    println!(
        "  Directory:  {}",
        config.directory_url.as_deref().unwrap_or("in-memory")
    );
    println!("\n  Assertion public key:");
    println!("  {}", public_key_b64);
    println!("========================================\n");

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
