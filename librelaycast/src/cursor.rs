//! Incremental delivery tracking
//!
//! The delivery cursor is the high-water mark of what has already been
//! handed to the broadcast hub. It lives only in memory: a restart starts
//! with an empty cursor, so the current backlog is re-delivered to whoever
//! connects after the restart. That duplication across process lifetimes
//! is accepted behavior, not a bug.

use crate::types::Post;

/// Tracks the id of the most recently delivered post for one account.
///
/// Owned exclusively by the poll loop; never shared, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryCursor {
    last_delivered_id: Option<String>,
}

impl DeliveryCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_delivered_id(&self) -> Option<&str> {
        self.last_delivered_id.as_deref()
    }

    /// Compute which of `fetched` (newest-first) are new, and advance.
    ///
    /// Returns the posts to deliver, oldest-first. Scans the window from
    /// the newest post down until the previously delivered id is found;
    /// if the id is not inside the window, the whole window is delivered
    /// and anything older that arrived between polls is lost. That is the
    /// accepted cost of fixed-window polling.
    ///
    /// The cursor always moves to the newest fetched id, even when the
    /// downstream delivery later fails: at-most-once, no tick-level retry.
    /// An empty fetch leaves the cursor untouched.
    pub fn advance(&mut self, fetched: &[Post]) -> Vec<Post> {
        let Some(newest) = fetched.first() else {
            return Vec::new();
        };

        let mut new_posts: Vec<Post> = match &self.last_delivered_id {
            None => fetched.to_vec(),
            Some(last) => fetched
                .iter()
                .take_while(|post| post.id != *last)
                .cloned()
                .collect(),
        };
        new_posts.reverse();

        self.last_delivered_id = Some(newest.id.clone());
        new_posts
    }
}
