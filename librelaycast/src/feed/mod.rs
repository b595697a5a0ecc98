//! Upstream feed abstraction and implementations
//!
//! The poll loop only sees the [`FeedSource`] trait: resolve a handle once,
//! then repeatedly fetch the most recent posts. The real implementation
//! talks to the Twitter v2 API; the mock implementation scripts fetch
//! results for tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Post;

pub mod twitter;

// Mock feed is available for all builds (not just tests) to support
// integration tests
pub mod mock;

/// A source of posts for one monitored account.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Resolve a handle to the account's stable identifier.
    ///
    /// # Errors
    ///
    /// - [`FeedError::AccountNotFound`] when the upstream API reports no
    ///   matching account; fatal to the polling session.
    /// - [`FeedError::Authentication`] when the API rejects our credentials.
    /// - [`FeedError::Upstream`] on transport failure; transient, callers
    ///   retry on the next tick.
    ///
    /// [`FeedError::AccountNotFound`]: crate::error::FeedError::AccountNotFound
    /// [`FeedError::Authentication`]: crate::error::FeedError::Authentication
    /// [`FeedError::Upstream`]: crate::error::FeedError::Upstream
    async fn resolve(&self, handle: &str) -> Result<String>;

    /// Fetch the most recent posts for an account, newest first.
    ///
    /// An account with no posts yields an empty vec, not an error. A
    /// transport failure yields [`FeedError::Upstream`], which callers must
    /// treat as transient: abandon the tick, keep the cursor, try again on
    /// the next one.
    ///
    /// [`FeedError::Upstream`]: crate::error::FeedError::Upstream
    async fn fetch_latest(&self, account_id: &str, limit: u32) -> Result<Vec<Post>>;
}
