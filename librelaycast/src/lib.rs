//! Relaycast - relay one account's social feed to WebSocket subscribers
//!
//! This library provides the core pieces shared by the `relay-serve` and
//! `relay-listen` binaries: the upstream feed abstraction, the delivery
//! cursor that decides what is new, the broadcast hub that fans posts out
//! to subscriber sessions, and the reconnecting client.

pub mod client;
pub mod config;
pub mod cursor;
pub mod error;
pub mod feed;
pub mod hub;
pub mod logging;
pub mod poll;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use cursor::DeliveryCursor;
pub use error::{RelaycastError, Result};
pub use hub::BroadcastHub;
pub use poll::PollLoop;
pub use server::BroadcastServer;
pub use types::{Account, ChannelMessage, Post, PostMessage};
