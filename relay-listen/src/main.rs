//! relay-listen - Print posts relayed by relay-serve
//!
//! Maintains a reconnecting subscription to the broadcast server and
//! prints every received post to stdout. Diagnostics go to stderr, so the
//! post stream can be piped.

use anyhow::Context;
use clap::Parser;
use librelaycast::client::SubscriberClient;
use librelaycast::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "relay-listen")]
#[command(version)]
#[command(about = "Subscribe to a relay-serve instance and print received posts")]
#[command(long_about = "\
relay-listen - Print posts relayed by relay-serve

DESCRIPTION:
    relay-listen connects to a running relay-serve instance, prints every
    received post to stdout, and reconnects with a fixed back-off whenever
    the connection drops or a payload cannot be decoded.

USAGE:
    # Connect to the default local server
    relay-listen

    # Connect elsewhere, retry quickly
    relay-listen --url ws://feeds.example.org:8765 --reconnect-delay 2s

SIGNALS:
    SIGTERM, SIGINT - Orderly exit with success status

EXIT CODES:
    0 - Clean exit (including interruption)
    1 - Startup error
")]
struct Cli {
    /// WebSocket URL of the relay server (overrides config)
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Delay between reconnect attempts, e.g. "5s" (overrides config)
    #[arg(long, value_name = "DURATION")]
    reconnect_delay: Option<humantime::Duration>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    librelaycast::logging::init_from_env(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    let reconnect_delay = cli
        .reconnect_delay
        .map(Into::into)
        .unwrap_or_else(|| config.channel.reconnect_delay());
    let url = cli.url.unwrap_or(config.channel.url);

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let client = SubscriberClient::new(url, reconnect_delay, shutdown);
    client.run().await?;

    Ok(())
}

/// Set up signal handlers for orderly exit
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to install signal handlers")?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, exiting...");
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}
