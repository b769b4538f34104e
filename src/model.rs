//! Wire models for the chat backend: streamed events, sessions and messages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminator of a streamed event (the JSON `type` key).
///
/// Unknown server strings are kept in `Other` so newer backends do not break
/// older clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Incremental fragment of the assistant reply
    Token,
    /// Failure reported by the server in the middle of a stream
    Error,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Token => "token",
            EventKind::Error => "error",
            EventKind::Other(kind) => kind,
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "token" => EventKind::Token,
            "error" => EventKind::Error,
            _ => EventKind::Other(value),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event dispatched from the streaming endpoint.
///
/// ```json
/// {"type": "token", "content": "Hel"}
/// ```
///
/// Keys other than `type` and `content` are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,

    #[serde(default)]
    pub content: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StreamEvent {
    /// Convenience constructor for a `token` event.
    pub fn token(content: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Token,
            content: content.into(),
            extra: Map::new(),
        }
    }

    /// Convenience constructor for an `error` event.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error,
            content: content.into(),
            extra: Map::new(),
        }
    }
}

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// A chat session descriptor.
///
/// The list endpoint names the identifier `id`; the create endpoint of older
/// backends names it `session_id`. Both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(alias = "session_id")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A message from a session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSessionMessage")]
pub struct SessionMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

// History rows carry either `role` or an `is_user` flag depending on the view.
#[derive(Deserialize)]
struct RawSessionMessage {
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    is_user: Option<bool>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: Option<String>,
}

impl From<RawSessionMessage> for SessionMessage {
    fn from(raw: RawSessionMessage) -> Self {
        let role = raw.role.unwrap_or(match raw.is_user {
            Some(true) => Role::User,
            _ => Role::Assistant,
        });
        SessionMessage {
            role,
            content: raw.content,
            thinking: raw.thinking.filter(|t| !t.is_empty()),
        }
    }
}

/// History payload: a bare array, or an object wrapping `messages`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MessageHistory {
    List(Vec<SessionMessage>),
    Wrapped { messages: Vec<SessionMessage> },
}

impl MessageHistory {
    pub(crate) fn into_messages(self) -> Vec<SessionMessage> {
        match self {
            MessageHistory::List(messages) | MessageHistory::Wrapped { messages } => messages,
        }
    }
}

/// Request body of the send and stream endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Reply of the non-streaming send endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub ai_message: AiMessage,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

/// Error body returned by the backend views.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}
