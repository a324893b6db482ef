use crate::{EnsembleError, EnsembleResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The highest protocol version this build understands.
///
/// Messages carrying a numerically newer version fail validation; older
/// versions remain accepted.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Classification of an [`AgentMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Expects a correlated [`MessageType::Response`].
    Request,
    /// Answers a prior request, linked via `correlation_id`.
    Response,
    /// One-way message, no response expected.
    Notification,
    /// Fan-out message addressed to many agents.
    Broadcast,
    /// Reports a failure back to the sender.
    Error,
    /// Connection/identity negotiation.
    Handshake,
    /// Liveness probe.
    Heartbeat,
}

/// Processing status carried on an [`AgentMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Created but not yet picked up.
    Pending,
    /// Currently being processed by the receiver.
    InProgress,
    /// Processing finished successfully.
    Completed,
    /// Processing failed.
    Failed,
    /// The correlated wait expired before a response arrived.
    Timeout,
    /// Processing was cancelled before completion.
    Cancelled,
}

/// The inter-agent message envelope.
///
/// Immutable once sent: routing and correlation only ever read it, and
/// broadcast delivery works on addressed copies rather than mutating the
/// original. The envelope is transport-agnostic — only its fields and the
/// validation rules in [`AgentMessage::validate`] are normative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Unique identifier, generated by the sender.
    pub message_id: String,
    /// Identifier of the sending agent.
    pub sender_id: String,
    /// Identifier of the addressed agent.
    pub receiver_id: String,
    /// Message classification.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Opaque structured payload.
    pub content: serde_json::Value,
    /// Processing status.
    pub status: MessageStatus,
    /// Links a response (or broadcast copy) back to its originating message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Protocol version the sender speaks.
    pub protocol_version: String,
    /// UTC timestamp of when the message was created.
    pub timestamp: DateTime<Utc>,
    /// Arbitrary key-value metadata attached to the message.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentMessage {
    /// Creates a new message with a generated id and the current timestamp.
    pub fn new(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        message_type: MessageType,
        content: serde_json::Value,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            message_type,
            content,
            status: MessageStatus::Pending,
            correlation_id: None,
            protocol_version: PROTOCOL_VERSION.to_string(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Creates a new [`MessageType::Request`] message.
    pub fn request(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self::new(sender_id, receiver_id, MessageType::Request, content)
    }

    /// Creates a new [`MessageType::Notification`] message.
    pub fn notification(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self::new(sender_id, receiver_id, MessageType::Notification, content)
    }

    /// Creates a [`MessageType::Response`] answering `request`, with
    /// `correlation_id` set to the request's message id.
    pub fn response_to(request: &AgentMessage, content: serde_json::Value) -> Self {
        let mut msg = Self::new(
            request.receiver_id.clone(),
            request.sender_id.clone(),
            MessageType::Response,
            content,
        );
        msg.correlation_id = Some(request.message_id.clone());
        msg.status = MessageStatus::Completed;
        msg
    }

    /// Creates an addressed copy of this message for one broadcast target.
    ///
    /// The copy gets a fresh `message_id` and keeps `correlation_id` set to
    /// this message's id so replies can be traced to the original.
    pub fn addressed_copy(&self, receiver_id: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.message_id = Uuid::new_v4().to_string();
        copy.receiver_id = receiver_id.into();
        copy.correlation_id = Some(self.message_id.clone());
        copy
    }

    /// Attaches a metadata entry, builder style.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Checks the envelope against the protocol rules, collecting every
    /// violation found.
    ///
    /// Rules: `message_id`, `sender_id`, and `receiver_id` must be
    /// non-empty; a [`MessageType::Request`] must carry non-empty content;
    /// `protocol_version` must be no newer than [`PROTOCOL_VERSION`].
    pub fn validate(&self) -> EnsembleResult<()> {
        let mut violations = Vec::new();

        if self.message_id.trim().is_empty() {
            violations.push("message_id must not be empty".to_string());
        }
        if self.sender_id.trim().is_empty() {
            violations.push("sender_id must not be empty".to_string());
        }
        if self.receiver_id.trim().is_empty() {
            violations.push("receiver_id must not be empty".to_string());
        }
        if self.message_type == MessageType::Request && content_is_empty(&self.content) {
            violations.push("request content must not be empty".to_string());
        }
        if !version_compatible(&self.protocol_version, PROTOCOL_VERSION) {
            violations.push(format!(
                "protocol version '{}' is not compatible (supported up to {})",
                self.protocol_version, PROTOCOL_VERSION
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(EnsembleError::Protocol { violations })
        }
    }

    /// Non-raising form of [`AgentMessage::validate`].
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

fn content_is_empty(content: &serde_json::Value) -> bool {
    match content {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Object(map) => map.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Returns true when `candidate` is a well-formed dotted-decimal version no
/// newer than `supported`.
///
/// Malformed versions on either side are treated as incompatible rather
/// than raising.
pub fn version_compatible(candidate: &str, supported: &str) -> bool {
    match (parse_version(candidate), parse_version(supported)) {
        (Some(c), Some(s)) => compare_segments(&c, &s) != std::cmp::Ordering::Greater,
        _ => false,
    }
}

fn parse_version(version: &str) -> Option<Vec<u64>> {
    if version.trim().is_empty() {
        return None;
    }
    version.split('.').map(|seg| seg.trim().parse().ok()).collect()
}

fn compare_segments(a: &[u64], b: &[u64]) -> std::cmp::Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}
