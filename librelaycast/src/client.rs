//! Reconnecting subscriber client
//!
//! Maintains a subscription to the broadcast server and prints every
//! received post to stdout (diagnostics go to stderr via tracing). Any
//! failure, whether a refused connection, a transport error, or a
//! malformed payload, drops the connection and retries after a fixed
//! back-off, forever, until shutdown is requested.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{error, info, warn};

use crate::error::{ChannelError, Result};
use crate::types::{ChannelMessage, PostMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct SubscriberClient {
    url: String,
    reconnect_delay: Duration,
    shutdown: Arc<AtomicBool>,
}

impl SubscriberClient {
    pub fn new(url: impl Into<String>, reconnect_delay: Duration, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
            shutdown,
        }
    }

    /// Connect, print, and reconnect until shutdown.
    pub async fn run(&self) -> Result<()> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            info!("Connecting to {}", self.url);
            match connect_async(self.url.as_str()).await {
                Ok((ws, _)) => {
                    info!("Connected, waiting for posts");
                    match self.listen(ws).await {
                        Ok(()) => info!("Connection closed by server"),
                        Err(e) => warn!("Connection error: {}", e),
                    }
                }
                Err(e) => warn!("Could not connect to {}: {}", self.url, e),
            }

            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            info!("Reconnecting in {}s", self.reconnect_delay.as_secs());
            self.wait_backoff().await;
        }

        info!("Subscriber stopped");
        Ok(())
    }

    async fn listen(&self, mut ws: WsStream) -> Result<()> {
        loop {
            tokio::select! {
                inbound = ws.next() => match inbound {
                    None | Some(Ok(Message::Close(_))) => return Ok(()),
                    Some(Ok(Message::Text(text))) => self.handle_payload(&text)?,
                    // Pings are answered by the protocol layer
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(ChannelError::Transport(e.to_string()).into()),
                },
                _ = sleep(Duration::from_secs(1)) => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_payload(&self, raw: &str) -> Result<()> {
        match decode_message(raw)? {
            ChannelMessage::Post(post) => print_post(&post),
            ChannelMessage::Error { error } => error!("Server reported: {}", error),
        }
        Ok(())
    }

    /// Fixed back-off, sliced so shutdown is honored promptly.
    async fn wait_backoff(&self) {
        let mut remaining = self.reconnect_delay;
        while !remaining.is_zero() {
            if self.shutdown.load(Ordering::Relaxed) {
                return;
            }
            let step = remaining.min(Duration::from_secs(1));
            sleep(step).await;
            remaining -= step;
        }
    }
}

/// Decode one channel frame.
///
/// Anything that is not a post or error payload is fatal to the
/// connection: the caller tears the session down and reconnects.
pub fn decode_message(raw: &str) -> Result<ChannelMessage> {
    serde_json::from_str(raw)
        .map_err(|e| ChannelError::MalformedPayload(e.to_string()).into())
}

fn print_post(post: &PostMessage) {
    println!("New post from @{}:", post.username);
    println!("  {}", post.text);
    println!("  {}", post.created_at.to_rfc3339());
}
