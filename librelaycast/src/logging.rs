//! Logging setup shared by the Relaycast binaries
//!
//! All diagnostics go to stderr so that stdout stays clean for the
//! subscriber's post output. Format and level are controlled by the
//! `RELAYCAST_LOG_FORMAT` and `RELAYCAST_LOG_LEVEL` environment variables,
//! or overridden programmatically by the binaries' `--verbose` flag.

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text output (no colors, for piping)
    Text,
    /// Machine-parseable JSON (one JSON object per line)
    Json,
    /// Pretty-printed with colors (for development)
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

/// Initialize the tracing subscriber.
///
/// `verbose` forces debug level unless `RUST_LOG` is set. Call once at
/// process start; panics if a subscriber is already installed.
pub fn init(format: LogFormat, level: &str, verbose: bool) {
    let fallback = if verbose { "debug" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .flatten_event(true)
                .with_target(true)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
    }
}

/// Initialize logging from the environment.
///
/// Falls back to text format at info level when the `RELAYCAST_LOG_*`
/// variables are unset.
pub fn init_from_env(verbose: bool) {
    let format = std::env::var("RELAYCAST_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);

    let level = std::env::var("RELAYCAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    init(format, &level, verbose);
}
