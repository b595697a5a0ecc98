//! Core types for Relaycast

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single post fetched from the upstream feed.
///
/// The `id` is assigned upstream and is opaque: it is only ever compared
/// for equality against the delivery cursor, never ordered or parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(id: impl Into<String>, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            created_at,
        }
    }
}

/// A monitored account, resolved once at startup and cached for the
/// process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub handle: String,
    pub resolved_id: String,
}

impl Account {
    pub fn new(handle: impl Into<String>, resolved_id: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            resolved_id: resolved_id.into(),
        }
    }
}

/// A post as it travels over the push channel.
///
/// `username` is the monitored handle, repeated on every message so that
/// subscribers need no out-of-band context. `created_at` serializes as an
/// RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMessage {
    pub text: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl PostMessage {
    pub fn new(post: &Post, username: &str) -> Self {
        Self {
            text: post.text.clone(),
            username: username.to_string(),
            created_at: post.created_at,
        }
    }
}

/// Every message a subscriber can receive.
///
/// The wire format is a bare JSON object per message: either a post
/// payload or, once per failed session, `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelMessage {
    Post(PostMessage),
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_post_message_from_post() {
        let post = Post::new("101", "hello world", sample_time());
        let message = PostMessage::new(&post, "somebody");

        assert_eq!(message.text, "hello world");
        assert_eq!(message.username, "somebody");
        assert_eq!(message.created_at, post.created_at);
    }

    #[test]
    fn test_post_message_wire_format() {
        let post = Post::new("101", "hello", sample_time());
        let message = ChannelMessage::Post(PostMessage::new(&post, "somebody"));

        let json = serde_json::to_string(&message).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["text"], "hello");
        assert_eq!(value["username"], "somebody");
        // RFC 3339 timestamp, as the subscriber expects
        assert_eq!(value["created_at"], "2024-03-01T12:30:00Z");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_error_wire_format() {
        let message = ChannelMessage::Error {
            error: "Account not found: ghost".to_string(),
        };

        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"error":"Account not found: ghost"}"#);
    }

    #[test]
    fn test_channel_message_decodes_post() {
        let json = r#"{"text":"hi","username":"somebody","created_at":"2024-03-01T12:30:00+00:00"}"#;
        let message: ChannelMessage = serde_json::from_str(json).unwrap();

        match message {
            ChannelMessage::Post(post) => {
                assert_eq!(post.text, "hi");
                assert_eq!(post.username, "somebody");
                assert_eq!(post.created_at, sample_time());
            }
            other => panic!("Expected post message, got {:?}", other),
        }
    }

    #[test]
    fn test_channel_message_decodes_error() {
        let json = r#"{"error":"User not found"}"#;
        let message: ChannelMessage = serde_json::from_str(json).unwrap();

        match message {
            ChannelMessage::Error { error } => assert_eq!(error, "User not found"),
            other => panic!("Expected error message, got {:?}", other),
        }
    }

    #[test]
    fn test_channel_message_rejects_unknown_shape() {
        let result: Result<ChannelMessage, _> = serde_json::from_str(r#"{"foo": 1}"#);
        assert!(result.is_err());

        let result: Result<ChannelMessage, _> = serde_json::from_str("not json at all");
        assert!(result.is_err());
    }

    #[test]
    fn test_post_id_compared_by_equality_only() {
        // Leading zeros survive: ids are strings, never numbers
        let a = Post::new("007", "first", sample_time());
        let b = Post::new("7", "second", sample_time());
        assert_ne!(a.id, b.id);
    }
}
