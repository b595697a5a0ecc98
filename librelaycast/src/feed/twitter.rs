//! Twitter v2 API feed source
//!
//! Two endpoints are used, matching the interface the rest of the system
//! treats as a black box:
//!
//! - `GET /2/users/by/username/{handle}` to resolve a handle to a user id
//! - `GET /2/users/{id}/tweets` for the latest posts, newest first
//!
//! The bearer token is read from the `RELAYCAST_BEARER_TOKEN` environment
//! variable and held in a `SecretString` so it is zeroed on drop and never
//! appears in debug output.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::FeedConfig;
use crate::error::{FeedError, Result};
use crate::feed::FeedSource;
use crate::types::Post;

/// Production API base. Overridable for tests and proxies.
pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";

/// Environment variable holding the API bearer token.
pub const BEARER_TOKEN_ENV: &str = "RELAYCAST_BEARER_TOKEN";

/// Feed source backed by the Twitter v2 API.
#[derive(Debug)]
pub struct TwitterFeed {
    client: reqwest::Client,
    api_base: String,
    bearer_token: SecretString,
}

impl TwitterFeed {
    /// Create a feed client against the production API.
    pub fn new(bearer_token: SecretString) -> Self {
        Self::with_api_base(bearer_token, DEFAULT_API_BASE)
    }

    /// Create a feed client against a specific API base URL.
    pub fn with_api_base(bearer_token: SecretString, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bearer_token,
        }
    }

    /// Create a feed client from the process environment.
    ///
    /// Honors `api_base` from the config when set. The token itself never
    /// lives in the config file.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Authentication` when `RELAYCAST_BEARER_TOKEN`
    /// is unset or empty.
    pub fn from_env(config: &FeedConfig) -> Result<Self> {
        let token = std::env::var(BEARER_TOKEN_ENV)
            .map_err(|_| {
                FeedError::Authentication(format!("{} is not set", BEARER_TOKEN_ENV))
            })?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(FeedError::Authentication(format!("{} is empty", BEARER_TOKEN_ENV)).into());
        }

        let api_base = config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        Ok(Self::with_api_base(SecretString::from(token), api_base))
    }
}

#[async_trait]
impl FeedSource for TwitterFeed {
    async fn resolve(&self, handle: &str) -> Result<String> {
        let url = format!("{}/2/users/by/username/{}", self.api_base, handle);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.bearer_token.expose_secret())
            .send()
            .await
            .map_err(|e| FeedError::Upstream(format!("user lookup request failed: {}", e)))?;

        check_status(response.status(), "user lookup")?;

        let body: UserLookupResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Upstream(format!("user lookup returned bad body: {}", e)))?;

        parse_user_lookup(handle, body)
    }

    async fn fetch_latest(&self, account_id: &str, limit: u32) -> Result<Vec<Post>> {
        // The API rejects max_results outside 5..=100; over-fetch the
        // minimum and trim locally when the caller asked for fewer.
        let max_results = limit.clamp(5, 100);
        let url = format!("{}/2/users/{}/tweets", self.api_base, account_id);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("max_results", max_results.to_string()),
                ("tweet.fields", "created_at,text".to_string()),
            ])
            .bearer_auth(self.bearer_token.expose_secret())
            .send()
            .await
            .map_err(|e| FeedError::Upstream(format!("timeline request failed: {}", e)))?;

        check_status(response.status(), "timeline fetch")?;

        let body: TimelineResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Upstream(format!("timeline returned bad body: {}", e)))?;

        let mut posts = parse_timeline(body);
        posts.truncate(limit as usize);
        Ok(posts)
    }
}

// ── Response shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UserLookupResponse {
    data: Option<UserObject>,
    errors: Option<Vec<ApiErrorObject>>,
}

#[derive(Debug, Deserialize)]
struct UserObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorObject {
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    data: Option<Vec<TweetObject>>,
}

#[derive(Debug, Deserialize)]
struct TweetObject {
    id: String,
    text: String,
    created_at: DateTime<Utc>,
}

fn check_status(status: StatusCode, context: &str) -> Result<()> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FeedError::Authentication(format!("{}: HTTP {}", context, status)).into());
    }
    if !status.is_success() {
        return Err(FeedError::Upstream(format!("{}: HTTP {}", context, status)).into());
    }
    Ok(())
}

/// The v2 API reports "no such user" inside a 200 body, not as an HTTP
/// error status.
fn parse_user_lookup(handle: &str, body: UserLookupResponse) -> Result<String> {
    if let Some(user) = body.data {
        return Ok(user.id);
    }

    let detail = body
        .errors
        .and_then(|errors| errors.into_iter().find_map(|e| e.detail))
        .unwrap_or_else(|| handle.to_string());
    Err(FeedError::AccountNotFound(detail).into())
}

/// An account with no posts comes back without a `data` key at all.
fn parse_timeline(body: TimelineResponse) -> Vec<Post> {
    body.data
        .unwrap_or_default()
        .into_iter()
        .map(|tweet| Post::new(tweet.id, tweet.text, tweet.created_at))
        .collect()
}
