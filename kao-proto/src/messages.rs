//! Pub/sub wire messages exchanged with overlay clients.
//!
//! Server-to-client frames are a `{ type, payload, timestamp }` envelope
//! ([`WireMessage`]); client-to-server control frames carry only
//! `{ type, payload }` ([`ControlFrame`]) and are limited to channel
//! subscription management.

use crate::expression::Expression;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// A named broadcast topic overlay clients can opt into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Avatar expression changes and connection status.
    Avatar,
    /// Source-control activity (commits, pull requests, check runs).
    Scm,
    /// Chat sentiment events.
    Chat,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Avatar, Channel::Scm, Channel::Chat];

    pub const fn as_str(self) -> &'static str {
        match self {
            Channel::Avatar => "avatar",
            Channel::Scm => "scm",
            Channel::Chat => "chat",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-to-client frame: a typed body plus an RFC 3339 timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    #[serde(flatten)]
    pub body: WireBody,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl WireMessage {
    /// Wrap a body in an envelope stamped with the current time.
    pub fn new(body: WireBody) -> Self {
        Self {
            body,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// The typed portion of a server-to-client frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum WireBody {
    /// The avatar changed expression (or returned to idle).
    #[serde(rename = "avatar:expression")]
    Expression(ExpressionEvent),
    /// Relay or motion-capture connection status.
    #[serde(rename = "avatar:status")]
    Status(StatusEvent),
    /// A commit landed.
    #[serde(rename = "scm:commit")]
    Commit(CommitEvent),
    /// A pull request changed state.
    #[serde(rename = "scm:pr")]
    PullRequest(PullRequestEvent),
    /// A check run (CI) update.
    #[serde(rename = "scm:check")]
    Check(CheckEvent),
}

/// Payload of an `avatar:expression` frame.
#[derive(Debug, Clone, Serialize)]
pub struct ExpressionEvent {
    pub expression: Expression,
    /// Display duration in milliseconds. Zero means "return to idle".
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventMetadata>,
}

/// Free-form provenance for an expression event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Payload of an `avatar:status` frame.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub connected: bool,
    /// Present on the welcome frame sent to a newly connected client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    /// Motion-capture peer address, present on VMC status transitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Payload of an `scm:commit` frame.
#[derive(Debug, Clone, Serialize)]
pub struct CommitEvent {
    pub repo: String,
    /// First line of the commit message.
    pub message: String,
    pub author: String,
    /// Short (7 character) commit hash.
    pub sha: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Payload of an `scm:pr` frame.
#[derive(Debug, Clone, Serialize)]
pub struct PullRequestEvent {
    pub repo: String,
    pub title: String,
    /// Resolved action: `merged` wins over the raw webhook action.
    pub action: String,
    pub number: u64,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Payload of an `scm:check` frame.
#[derive(Debug, Clone, Serialize)]
pub struct CheckEvent {
    pub repo: String,
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Client-to-server control frame.
///
/// Anything that fails to deserialize into this enum is a malformed
/// control frame: the hub logs it and keeps the connection open.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ControlFrame {
    Subscribe(SubscribePayload),
    Unsubscribe(SubscribePayload),
}

/// Channels named in a subscribe/unsubscribe request.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribePayload {
    pub channels: Vec<Channel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_frame_has_type_payload_timestamp_shape() {
        let msg = WireMessage::new(WireBody::Expression(ExpressionEvent {
            expression: Expression::Happy,
            duration: 2000,
            trigger: Some("commit".into()),
            metadata: None,
        }));
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "avatar:expression");
        assert_eq!(value["payload"]["expression"], "happy");
        assert_eq!(value["payload"]["duration"], 2000);
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn subscribe_frame_parses() {
        let frame: ControlFrame = serde_json::from_str(
            r#"{"type":"subscribe","payload":{"channels":["avatar","scm"]}}"#,
        )
        .unwrap();
        match frame {
            ControlFrame::Subscribe(p) => {
                assert_eq!(p.channels, vec![Channel::Avatar, Channel::Scm]);
            }
            _ => panic!("expected subscribe"),
        }
    }

    #[test]
    fn unknown_channel_is_a_malformed_frame() {
        let result: Result<ControlFrame, _> =
            serde_json::from_str(r#"{"type":"subscribe","payload":{"channels":["nope"]}}"#);
        assert!(result.is_err());
    }
}
