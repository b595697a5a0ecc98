//! WebSocket broadcast server
//!
//! Accepts subscriber connections indefinitely and runs one task per
//! session. A fresh session first gets the current backlog snapshot
//! (oldest-first), then every delivery event fanned out by the hub, in
//! order, until it disconnects. If the monitored account could not be
//! resolved, a session gets a single `{"error": ...}` payload instead and
//! is closed.
//!
//! A dead session is simply dropped: partially delivered backlog or missed
//! events are not retried, only connection-level errors are logged.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{info, warn};

use crate::error::{ChannelError, RelaycastError, Result};
use crate::hub::{BroadcastHub, FeedEvent};
use crate::types::{ChannelMessage, Post, PostMessage};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

pub struct BroadcastServer {
    listener: TcpListener,
    hub: BroadcastHub,
    username: String,
}

impl BroadcastServer {
    /// Bind the listening socket. Port 0 binds an ephemeral port, which
    /// integration tests rely on.
    pub async fn bind(addr: &str, username: &str, hub: BroadcastHub) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|source| ChannelError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        Ok(Self {
            listener,
            hub,
            username: username.to_string(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ChannelError::Transport(format!("local_addr failed: {}", e)).into())
    }

    /// Accept subscribers until shutdown is requested.
    ///
    /// Sessions already in flight keep running; they end when the process
    /// exits or their subscriber disconnects.
    pub async fn run(self, shutdown: Arc<AtomicBool>) -> Result<()> {
        info!("WebSocket server listening on ws://{}", self.local_addr()?);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(serve_session(
                            stream,
                            peer,
                            self.hub.clone(),
                            self.username.clone(),
                        ));
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
                _ = sleep(Duration::from_secs(1)) => {
                    if shutdown.load(Ordering::Relaxed) {
                        info!("Shutdown requested, no longer accepting subscribers");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

async fn serve_session(stream: TcpStream, peer: SocketAddr, hub: BroadcastHub, username: String) {
    info!("New subscriber connected from {}", peer);

    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
    };

    match session_loop(ws, &hub, &username).await {
        Ok(()) | Err(RelaycastError::Channel(ChannelError::Closed)) => {
            info!("Subscriber {} disconnected", peer);
        }
        Err(e) => warn!("Subscriber session {} ended: {}", peer, e),
    }
}

async fn session_loop(
    ws: WebSocketStream<TcpStream>,
    hub: &BroadcastHub,
    username: &str,
) -> Result<()> {
    let (mut sink, mut stream) = ws.split();

    // Account resolution already failed: report once and close.
    if let Some(reason) = hub.fatal_error() {
        send_error(&mut sink, &reason).await?;
        let _ = sink.close().await;
        return Ok(());
    }

    // Subscribe before reading the snapshot so nothing published in
    // between is missed.
    let mut events = hub.subscribe();

    if let Some(backlog) = hub.snapshot() {
        for post in &backlog {
            send_post(&mut sink, post, username).await?;
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(FeedEvent::Post(post)) => send_post(&mut sink, &post, username).await?,
                Ok(FeedEvent::AccountFailed(reason)) => {
                    send_error(&mut sink, &reason).await?;
                    let _ = sink.close().await;
                    return Ok(());
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagging, skipped {} event(s)", skipped);
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            inbound = stream.next() => match inbound {
                None | Some(Ok(Message::Close(_))) => return Err(ChannelError::Closed.into()),
                // Subscribers don't speak; pings are answered by the
                // protocol layer, anything else is ignored.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(ChannelError::Transport(e.to_string()).into()),
            },
        }
    }
}

async fn send_post(sink: &mut WsSink, post: &Post, username: &str) -> Result<()> {
    send_json(sink, &ChannelMessage::Post(PostMessage::new(post, username))).await
}

async fn send_error(sink: &mut WsSink, reason: &str) -> Result<()> {
    send_json(
        sink,
        &ChannelMessage::Error {
            error: reason.to_string(),
        },
    )
    .await
}

async fn send_json(sink: &mut WsSink, message: &ChannelMessage) -> Result<()> {
    let payload = serde_json::to_string(message)
        .map_err(|e| ChannelError::Transport(format!("encode failed: {}", e)))?;
    sink.send(Message::Text(payload))
        .await
        .map_err(|e| ChannelError::Transport(e.to_string()))?;
    Ok(())
}
