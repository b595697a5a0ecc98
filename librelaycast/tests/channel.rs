//! End-to-end tests over a real localhost WebSocket
//!
//! A broadcast server on an ephemeral port, a scripted mock feed, and raw
//! tokio-tungstenite clients standing in for subscribers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures::StreamExt;
use librelaycast::client::{decode_message, SubscriberClient};
use librelaycast::config::FeedConfig;
use librelaycast::error::FeedError;
use librelaycast::feed::mock::MockFeed;
use librelaycast::hub::BroadcastHub;
use librelaycast::poll::PollLoop;
use librelaycast::server::BroadcastServer;
use librelaycast::types::{Account, ChannelMessage, Post};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn window(ids: &[u32]) -> Vec<Post> {
    ids.iter()
        .map(|id| {
            Post::new(
                id.to_string(),
                format!("post {}", id),
                Utc.timestamp_opt(1_700_000_000 + i64::from(*id), 0).unwrap(),
            )
        })
        .collect()
}

fn poll_loop(feed: &MockFeed, hub: &BroadcastHub) -> (PollLoop, Account) {
    let config = FeedConfig {
        handle: "somebody".to_string(),
        poll_interval_secs: 1,
        ..Default::default()
    };
    let poll = PollLoop::new(
        Arc::new(feed.clone()),
        hub.clone(),
        &config,
        Arc::new(AtomicBool::new(false)),
    );
    (poll, Account::new("somebody", "acct-1"))
}

/// Bind on an ephemeral port and run the accept loop in the background.
async fn start_server(hub: BroadcastHub) -> (SocketAddr, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let server = BroadcastServer::bind("127.0.0.1:0", "somebody", hub)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run(shutdown.clone()));
    (addr, shutdown)
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = timeout(WAIT, connect_async(format!("ws://{}", addr).as_str()))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    ws
}

async fn next_message(ws: &mut WsClient) -> ChannelMessage {
    loop {
        let frame = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended unexpectedly")
            .expect("transport error");
        match frame {
            Message::Text(text) => return decode_message(&text).expect("malformed payload"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

async fn next_post_id(ws: &mut WsClient) -> (String, String) {
    match next_message(ws).await {
        ChannelMessage::Post(post) => {
            // The wire carries no id; posts in these tests embed it in the text
            let id = post.text.trim_start_matches("post ").to_string();
            (id, post.username)
        }
        other => panic!("expected a post payload, got {:?}", other),
    }
}

async fn expect_closed(ws: &mut WsClient) {
    match timeout(WAIT, ws.next()).await.expect("timed out waiting for close") {
        None | Some(Ok(Message::Close(_))) | Some(Err(_)) => {}
        other => panic!("expected the server to close, got {:?}", other),
    }
}

#[tokio::test]
async fn test_subscriber_receives_backlog_then_live_posts_in_order() {
    let feed = MockFeed::new("acct-1");
    feed.push_fetch(window(&[2, 1]));
    feed.push_fetch(window(&[4, 3, 2, 1]));

    let hub = BroadcastHub::new(64);
    let (mut poll, account) = poll_loop(&feed, &hub);
    let (addr, _shutdown) = start_server(hub).await;

    poll.tick(&account).await.unwrap();

    let mut ws = connect(addr).await;

    // Backlog snapshot first, oldest-first, stamped with the handle
    for expected in ["1", "2"] {
        let (id, username) = next_post_id(&mut ws).await;
        assert_eq!(id, expected);
        assert_eq!(username, "somebody");
    }

    // Live delivery events follow in tick order
    poll.tick(&account).await.unwrap();
    for expected in ["3", "4"] {
        let (id, _) = next_post_id(&mut ws).await;
        assert_eq!(id, expected);
    }
}

#[tokio::test]
async fn test_subscriber_before_first_fetch_gets_no_backlog_only_live_posts() {
    let feed = MockFeed::new("acct-1");
    feed.push_fetch(window(&[1]));

    let hub = BroadcastHub::new(64);
    let (mut poll, account) = poll_loop(&feed, &hub);
    let (addr, _shutdown) = start_server(hub).await;

    let mut ws = connect(addr).await;
    // Give the session task a moment to subscribe before the tick runs,
    // so the live event is not racing session setup
    tokio::time::sleep(Duration::from_millis(100)).await;

    poll.tick(&account).await.unwrap();

    let (id, _) = next_post_id(&mut ws).await;
    assert_eq!(id, "1");
}

#[tokio::test]
async fn test_late_joiner_gets_snapshot_only() {
    let feed = MockFeed::new("acct-1");
    feed.push_fetch(window(&[2, 1]));
    feed.push_fetch(window(&[4, 3, 2, 1]));

    let hub = BroadcastHub::new(64);
    let (mut poll, account) = poll_loop(&feed, &hub);

    // Both ticks happen before anyone connects
    poll.tick(&account).await.unwrap();
    poll.tick(&account).await.unwrap();

    let (addr, _shutdown) = start_server(hub).await;
    let mut ws = connect(addr).await;

    // The latest window, not the event history
    for expected in ["1", "2", "3", "4"] {
        let (id, _) = next_post_id(&mut ws).await;
        assert_eq!(id, expected);
    }

    // Nothing further is owed to this session
    let extra = timeout(Duration::from_millis(300), ws.next()).await;
    assert!(extra.is_err(), "expected silence, got {:?}", extra);
}

#[tokio::test]
async fn test_unknown_account_yields_one_error_payload_then_close() {
    let feed = MockFeed::resolve_failure(FeedError::AccountNotFound(
        "Could not find user: ghost".to_string(),
    ));

    let hub = BroadcastHub::new(64);
    let (poll, _) = poll_loop(&feed, &hub);

    // Polling ends immediately; the hub carries the terminal error
    assert!(poll.run().await.is_err());

    let (addr, _shutdown) = start_server(hub).await;
    let mut ws = connect(addr).await;

    match next_message(&mut ws).await {
        ChannelMessage::Error { error } => assert!(error.contains("ghost")),
        other => panic!("expected an error payload, got {:?}", other),
    }
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_malformed_payload_triggers_reconnect_within_one_backoff() {
    // A bare WebSocket endpoint that feeds the client garbage
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Arc::new(AtomicBool::new(false));
    let client = SubscriberClient::new(
        format!("ws://{}", addr),
        Duration::from_millis(100),
        shutdown.clone(),
    );
    let client_task = tokio::spawn(async move { client.run().await });

    // First connection: handshake, then a payload that is not a channel
    // message at all
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    futures::SinkExt::send(&mut ws, Message::Text("certainly not json".to_string()))
        .await
        .unwrap();

    // The client must come back on its own: a second accept proves the
    // malformed payload caused a reconnect, not a crash
    let second = timeout(WAIT, listener.accept()).await;
    assert!(second.is_ok(), "client did not reconnect after malformed payload");

    shutdown.store(true, Ordering::Relaxed);
    drop(ws);
    drop(second);

    let result = timeout(WAIT, client_task).await.expect("client did not stop").unwrap();
    assert!(result.is_ok());
}
