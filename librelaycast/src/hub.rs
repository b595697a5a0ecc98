//! Broadcast hub connecting the poll loop to subscriber sessions
//!
//! The hub is the explicit fan-out primitive between the single poll loop
//! and N independent subscriber sessions. It wraps a `tokio::sync::broadcast`
//! channel for live delivery events plus a small amount of shared state for
//! late joiners: the latest backlog snapshot and, if account resolution
//! failed, the terminal error.
//!
//! Events are dropped when no session is subscribed; a session that lags
//! behind the channel capacity observes `Lagged` and simply skips ahead.
//! Neither case blocks the poll loop.

use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use crate::types::Post;

/// Per-subscriber buffer capacity. Sessions that fall further behind than
/// this skip events (RecvError::Lagged).
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event receiver type alias
pub type FeedEventReceiver = broadcast::Receiver<FeedEvent>;

/// A delivery event fanned out to every connected session.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A newly discovered post, one event per post, oldest first.
    Post(Post),
    /// The monitored account could not be resolved; sessions report the
    /// reason once and close.
    AccountFailed(String),
}

#[derive(Default)]
struct Shared {
    /// Latest full fetch result, oldest-first. `None` until the first
    /// successful fetch completes.
    snapshot: Option<Vec<Post>>,
    /// Set once if account resolution failed; never cleared.
    fatal: Option<String>,
}

/// The fan-out hub. Cloneable; each clone shares the same channel and state.
#[derive(Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<FeedEvent>,
    shared: Arc<RwLock<Shared>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            shared: Arc::new(RwLock::new(Shared::default())),
        }
    }

    /// Subscribe to delivery events. Each session calls this once, before
    /// reading the snapshot, so no event published in between is missed.
    pub fn subscribe(&self) -> FeedEventReceiver {
        self.sender.subscribe()
    }

    /// Fan a new post out to all currently subscribed sessions.
    pub fn publish(&self, post: Post) {
        // send() errs when no session is listening; that's fine.
        let _ = self.sender.send(FeedEvent::Post(post));
    }

    /// Replace the backlog snapshot with the latest fetch result
    /// (oldest-first).
    pub fn set_snapshot(&self, posts: Vec<Post>) {
        self.shared.write().unwrap().snapshot = Some(posts);
    }

    /// The snapshot a newly connected session receives, if any fetch has
    /// completed yet.
    pub fn snapshot(&self) -> Option<Vec<Post>> {
        self.shared.read().unwrap().snapshot.clone()
    }

    /// Mark the feed as terminally failed and notify live sessions.
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.shared.write().unwrap().fatal = Some(reason.clone());
        let _ = self.sender.send(FeedEvent::AccountFailed(reason));
    }

    /// The terminal failure reason, if resolution has failed.
    pub fn fatal_error(&self) -> Option<String> {
        self.shared.read().unwrap().fatal.clone()
    }

    /// Number of currently subscribed sessions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
