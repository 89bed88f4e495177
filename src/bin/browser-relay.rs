//! Browser relay daemon.
//!
//! Connects to a browser's DevTools endpoint, then serves the desktop app
//! until interrupted.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use browser_relay::{CdpBrowser, DEFAULT_ENDPOINT, Relay, SnapshotOptions};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "browser-relay")]
#[command(about = "Relay desktop-app commands to attached browser tabs", long_about = None)]
#[command(version)]
struct Cli {
    /// Desktop-app WebSocket endpoint
    #[arg(long, env = "BROWSER_RELAY_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Browser DevTools endpoint (http://host:port or ws://.../devtools/browser/<id>)
    #[arg(long, env = "BROWSER_RELAY_CDP", default_value = "http://127.0.0.1:9222")]
    cdp: String,

    /// Delay between reconnect attempts, in milliseconds
    #[arg(long, env = "BROWSER_RELAY_RECONNECT_MS", default_value_t = 5000)]
    reconnect_ms: u64,

    /// Timeout for each DevTools call, in milliseconds
    #[arg(long, env = "BROWSER_RELAY_COMMAND_TIMEOUT_MS", default_value_t = 30_000)]
    command_timeout_ms: u64,

    /// Maximum text items in a snapshot
    #[arg(long, default_value_t = 200)]
    max_text_items: usize,

    /// Include ignored accessibility nodes in snapshots
    #[arg(long)]
    include_ignored: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Relay failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> browser_relay::Result<()> {
    let (browser, events) =
        CdpBrowser::connect(&cli.cdp, Duration::from_millis(cli.command_timeout_ms)).await?;
    info!(cdp = %cli.cdp, "Browser connected");

    let mut snapshot = SnapshotOptions::new().with_max_text_items(cli.max_text_items);
    if cli.include_ignored {
        snapshot = snapshot.with_include_ignored();
    }

    let relay = Relay::builder()
        .endpoint(cli.endpoint)
        .browser(Arc::new(browser), events)
        .reconnect_delay(Duration::from_millis(cli.reconnect_ms))
        .snapshot_options(snapshot)
        .on_status(|state| info!(%state, "Desktop app connection"))
        .build()?;

    let handle = relay.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            handle.shutdown();
        }
    });

    relay.run().await
}
