//! Mock feed source for testing
//!
//! Scripts a sequence of per-tick fetch results so tests can drive the
//! poll loop deterministically: push one entry per expected tick, then
//! assert on what was delivered. Resolution failures are injectable for
//! the account-not-found path.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{FeedError, Result};
use crate::feed::FeedSource;
use crate::types::Post;

type FetchResult = std::result::Result<Vec<Post>, FeedError>;

/// Mock feed whose fetch results are scripted ahead of time.
///
/// Cloning shares the script and counters, so a test can keep a handle
/// while the poll loop owns another.
#[derive(Clone)]
pub struct MockFeed {
    account_id: String,
    resolve_error: Option<FeedError>,
    fetch_script: Arc<Mutex<VecDeque<FetchResult>>>,
    resolve_calls: Arc<Mutex<usize>>,
    fetch_calls: Arc<Mutex<usize>>,
}

impl MockFeed {
    /// A feed that resolves every handle to `account_id`.
    pub fn new(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            resolve_error: None,
            fetch_script: Arc::new(Mutex::new(VecDeque::new())),
            resolve_calls: Arc::new(Mutex::new(0)),
            fetch_calls: Arc::new(Mutex::new(0)),
        }
    }

    /// A feed whose resolution fails with the given error.
    pub fn resolve_failure(error: FeedError) -> Self {
        Self {
            resolve_error: Some(error),
            ..Self::new("unused")
        }
    }

    /// Queue a successful fetch result (newest-first) for the next tick.
    pub fn push_fetch(&self, posts: Vec<Post>) {
        self.fetch_script.lock().unwrap().push_back(Ok(posts));
    }

    /// Queue a transient upstream failure for the next tick.
    pub fn push_fetch_error(&self, message: &str) {
        self.fetch_script
            .lock()
            .unwrap()
            .push_back(Err(FeedError::Upstream(message.to_string())));
    }

    pub fn resolve_call_count(&self) -> usize {
        *self.resolve_calls.lock().unwrap()
    }

    pub fn fetch_call_count(&self) -> usize {
        *self.fetch_calls.lock().unwrap()
    }
}

#[async_trait]
impl FeedSource for MockFeed {
    async fn resolve(&self, handle: &str) -> Result<String> {
        *self.resolve_calls.lock().unwrap() += 1;
        let _ = handle;
        match &self.resolve_error {
            Some(error) => Err(error.clone().into()),
            None => Ok(self.account_id.clone()),
        }
    }

    async fn fetch_latest(&self, _account_id: &str, _limit: u32) -> Result<Vec<Post>> {
        *self.fetch_calls.lock().unwrap() += 1;
        // An exhausted script behaves like a quiet account
        match self.fetch_script.lock().unwrap().pop_front() {
            Some(Ok(posts)) => Ok(posts),
            Some(Err(error)) => Err(error.into()),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn post(id: &str) -> Post {
        Post::new(id, "text", Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    #[tokio::test]
    async fn test_scripted_fetches_pop_in_order() {
        let feed = MockFeed::new("acct-1");
        feed.push_fetch(vec![post("2"), post("1")]);
        feed.push_fetch_error("flaky network");

        let first = feed.fetch_latest("acct-1", 5).await.unwrap();
        assert_eq!(first.len(), 2);

        assert!(feed.fetch_latest("acct-1", 5).await.is_err());

        // Script exhausted: quiet account
        assert!(feed.fetch_latest("acct-1", 5).await.unwrap().is_empty());
        assert_eq!(feed.fetch_call_count(), 3);
    }

    #[tokio::test]
    async fn test_resolution() {
        let feed = MockFeed::new("acct-1");
        assert_eq!(feed.resolve("anyone").await.unwrap(), "acct-1");
        assert_eq!(feed.resolve_call_count(), 1);

        let failing =
            MockFeed::resolve_failure(FeedError::AccountNotFound("ghost".to_string()));
        assert!(failing.resolve("ghost").await.is_err());
    }
}
