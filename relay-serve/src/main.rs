//! relay-serve - Poll a social account and broadcast new posts
//!
//! Long-running daemon that polls the monitored account's feed at a fixed
//! interval and relays every newly discovered post to all connected
//! WebSocket subscribers.

use clap::Parser;
use librelaycast::error::{FeedError, RelaycastError};
use librelaycast::feed::twitter::TwitterFeed;
use librelaycast::{BroadcastHub, BroadcastServer, Config, PollLoop, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "relay-serve")]
#[command(version)]
#[command(about = "Poll a social account and broadcast new posts over WebSocket")]
#[command(long_about = "\
relay-serve - Poll a social account and broadcast new posts

DESCRIPTION:
    relay-serve is a long-running daemon that watches one account's feed
    and pushes newly discovered posts to every connected WebSocket
    subscriber.

    Each connecting subscriber first receives a snapshot of the most
    recent fetch, then every new post as it is discovered, oldest first.
    Transient upstream failures skip a poll tick; they are invisible to
    subscribers.

USAGE:
    # Run with config defaults
    RELAYCAST_BEARER_TOKEN=... relay-serve

    # Watch a different account, poll every minute
    relay-serve --handle rustlang --poll-interval 1m

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown

CONFIGURATION:
    Configuration file: ~/.config/relaycast/config.toml (optional)
    Bearer token: RELAYCAST_BEARER_TOKEN environment variable

    [feed]
    handle = \"elonmusk\"        # account to monitor
    fetch_limit = 5            # posts per fetch (the dedup window)
    poll_interval_secs = 30    # seconds between polls

    [channel]
    bind_addr = \"127.0.0.1:8765\"

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Authentication error (missing or rejected bearer token)
    3 - Invalid input
")]
struct Cli {
    /// Account handle to monitor (overrides config)
    #[arg(long, value_name = "HANDLE")]
    handle: Option<String>,

    /// Poll interval, e.g. "30s" or "2m" (overrides config)
    #[arg(long, value_name = "DURATION")]
    poll_interval: Option<humantime::Duration>,

    /// Listen address for the push channel (overrides config)
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Run one poll tick and exit (for testing)
    #[arg(long, hide = true)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    librelaycast::logging::init_from_env(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(handle) = cli.handle {
        config.feed.handle = handle;
    }
    if let Some(interval) = cli.poll_interval {
        config.feed.poll_interval_secs = interval.as_secs();
    }
    if let Some(bind) = cli.bind {
        config.channel.bind_addr = bind;
    }

    let feed = Arc::new(TwitterFeed::from_env(&config.feed)?);
    let hub = BroadcastHub::default();

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let mut poll = PollLoop::new(feed, hub.clone(), &config.feed, shutdown.clone());

    if cli.once {
        let delivered = poll.run_once().await?;
        info!("relay-serve: processed one tick ({} new post(s)), exiting", delivered);
        return Ok(());
    }

    info!("relay-serve daemon starting");
    info!(
        "Monitoring @{} every {}s",
        config.feed.handle, config.feed.poll_interval_secs
    );

    let server = BroadcastServer::bind(&config.channel.bind_addr, &config.feed.handle, hub).await?;
    let server_task = tokio::spawn(server.run(shutdown.clone()));

    match poll.run().await {
        Ok(()) => {}
        // An unknown account ends polling but not serving: the server
        // keeps reporting the error payload to anyone who connects.
        Err(e @ RelaycastError::Feed(FeedError::AccountNotFound(_))) => {
            error!("Polling stopped: {}", e);
            while !shutdown.load(Ordering::Relaxed) {
                sleep(Duration::from_secs(1)).await;
            }
        }
        Err(e) => return Err(e),
    }

    let _ = server_task.await;
    info!("relay-serve daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| RelaycastError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}
