//! The fetch-compute-deliver loop
//!
//! One poll loop per process drives the feed source on a fixed interval,
//! runs the delivery cursor over each fetch result, and hands new posts to
//! the broadcast hub. The loop owns the cursor outright; nothing else ever
//! touches it.
//!
//! A tick that fails upstream is abandoned: logged, cursor untouched, next
//! tick unaffected. Only a failed account resolution ends polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::FeedConfig;
use crate::cursor::DeliveryCursor;
use crate::error::{FeedError, RelaycastError, Result};
use crate::feed::FeedSource;
use crate::hub::BroadcastHub;
use crate::types::Account;

pub struct PollLoop {
    feed: Arc<dyn FeedSource>,
    hub: BroadcastHub,
    handle: String,
    fetch_limit: u32,
    interval: Duration,
    cursor: DeliveryCursor,
    shutdown: Arc<AtomicBool>,
}

impl PollLoop {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        hub: BroadcastHub,
        config: &FeedConfig,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            feed,
            hub,
            handle: config.handle.clone(),
            fetch_limit: config.fetch_limit,
            interval: config.poll_interval(),
            cursor: DeliveryCursor::new(),
            shutdown,
        }
    }

    pub fn cursor(&self) -> &DeliveryCursor {
        &self.cursor
    }

    /// Run until shutdown is requested.
    ///
    /// The first fetch happens immediately; the interval wait comes after
    /// each tick, not before the first one.
    ///
    /// # Errors
    ///
    /// Returns the resolution error when the monitored account cannot be
    /// resolved. `AccountNotFound` has already been pushed to the hub at
    /// that point, so the caller can keep the server running to report it
    /// to subscribers.
    pub async fn run(mut self) -> Result<()> {
        let Some(account) = self.resolve_with_retry().await? else {
            return Ok(());
        };
        info!("Monitoring posts from @{}", account.handle);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, stopping poll loop");
                break;
            }

            if let Err(e) = self.tick(&account).await {
                warn!("Poll tick abandoned: {}", e);
            }

            self.wait_interval().await;
        }

        Ok(())
    }

    /// Resolve the handle and run a single tick. Used by `--once`.
    pub async fn run_once(&mut self) -> Result<usize> {
        let account = self.resolve_once().await?;
        self.tick(&account).await
    }

    /// One fetch-compute-deliver cycle.
    ///
    /// Returns how many posts were delivered. On a transient upstream
    /// failure the cursor and the hub snapshot are left exactly as the
    /// previous tick left them.
    pub async fn tick(&mut self, account: &Account) -> Result<usize> {
        let fetched = self
            .feed
            .fetch_latest(&account.resolved_id, self.fetch_limit)
            .await?;

        let new_posts = self.cursor.advance(&fetched);

        let mut snapshot = fetched;
        snapshot.reverse();
        self.hub.set_snapshot(snapshot);

        let delivered = new_posts.len();
        for post in new_posts {
            debug!("Publishing post {}", post.id);
            self.hub.publish(post);
        }
        if delivered > 0 {
            info!("Delivered {} new post(s)", delivered);
        }

        Ok(delivered)
    }

    /// Single resolution attempt. An unknown account is pushed to the hub
    /// so sessions can report it before this error reaches the caller.
    async fn resolve_once(&self) -> Result<Account> {
        match self.feed.resolve(&self.handle).await {
            Ok(id) => {
                debug!("Resolved @{} to account id {}", self.handle, id);
                Ok(Account::new(self.handle.clone(), id))
            }
            Err(RelaycastError::Feed(err)) => {
                if matches!(err, FeedError::AccountNotFound(_)) {
                    self.hub.fail(err.to_string());
                }
                Err(err.into())
            }
            Err(other) => Err(other),
        }
    }

    /// Resolution with retry: transient upstream failures wait out the
    /// poll interval and try again; anything else is final. `Ok(None)`
    /// means shutdown was requested while retrying.
    async fn resolve_with_retry(&self) -> Result<Option<Account>> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(None);
            }

            match self.resolve_once().await {
                Ok(account) => return Ok(Some(account)),
                Err(RelaycastError::Feed(FeedError::Upstream(msg))) => {
                    warn!("Account resolution failed: {}; retrying after interval", msg);
                    self.wait_interval().await;
                }
                Err(e) => {
                    error!("Cannot monitor @{}: {}", self.handle, e);
                    return Err(e);
                }
            }
        }
    }

    /// Sleep the poll interval in one-second slices so a shutdown request
    /// is honored promptly.
    async fn wait_interval(&self) {
        let mut remaining = self.interval;
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
