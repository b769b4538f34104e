//! Chat conversation controller.
//!
//! Keeps the message list of the active session and grows the assistant's
//! reply as tokens stream in. `send` borrows the conversation mutably, so only
//! one send can be in flight at a time.

use std::time::{SystemTime, UNIX_EPOCH};

use itertools::Itertools;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{ChatApi, ClientError};
use crate::model::{EventKind, Role, Session, SessionMessage, StreamEvent};
use crate::stream::StreamObserver;

/// Text shown in place of the reply when the stream fails.
pub const TRANSPORT_ERROR_MESSAGE: &str = "An error occurred. Please try again in a moment.";

const THINKING_KIND: &str = "thinking";

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("message is empty")]
    EmptyInput,

    #[error("no active session")]
    NoSession,
}

/// A message as displayed in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub thinking: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            thinking: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            thinking: None,
        }
    }
}

impl From<SessionMessage> for ChatMessage {
    fn from(message: SessionMessage) -> Self {
        Self {
            role: message.role,
            content: message.content,
            thinking: message.thinking,
        }
    }
}

/// Writes streamed events into the pending assistant message.
struct ReplyObserver<'a> {
    reply: &'a mut ChatMessage,
    failure: Option<ClientError>,
}

impl StreamObserver for ReplyObserver<'_> {
    fn on_chunk(&mut self, event: StreamEvent) {
        match event.kind {
            EventKind::Token => self.reply.content.push_str(&event.content),
            EventKind::Error => {
                warn!(message = %event.content, "server reported a streaming error");
                self.reply.content = event.content;
            }
            EventKind::Other(kind) if kind == THINKING_KIND => self
                .reply
                .thinking
                .get_or_insert_with(String::new)
                .push_str(&event.content),
            EventKind::Other(kind) => debug!(%kind, "ignoring stream event"),
        }
    }

    fn on_done(&mut self) {}

    fn on_error(&mut self, error: ClientError) {
        if !matches!(error, ClientError::StreamCancelled) {
            self.reply.content = TRANSPORT_ERROR_MESSAGE.to_string();
        }
        self.failure = Some(error);
    }
}

/// Conversation state bound to one [`ChatApi`].
pub struct Conversation<A: ChatApi> {
    api: A,
    session_id: Option<String>,
    messages: Vec<ChatMessage>,
}

impl<A: ChatApi> Conversation<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            session_id: None,
            messages: Vec::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Open the most recent session, or start a new one if there is none.
    ///
    /// A failure to list sessions is treated like an empty list.
    pub async fn resume_or_create(&mut self) -> Result<(), ConversationError> {
        let sessions = match self.api.list_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "could not list chat sessions");
                Vec::new()
            }
        };

        match sessions.into_iter().next() {
            Some(latest) => self.select_session(&latest.id).await,
            None => self.new_session().await.map(|_| ()),
        }
    }

    /// Start a fresh session.
    ///
    /// When the backend cannot create one, a local `temp-<millis>` id is used
    /// so the view stays usable, and the error is still returned.
    pub async fn new_session(&mut self) -> Result<Session, ConversationError> {
        self.messages.clear();

        match self.api.create_session().await {
            Ok(session) => {
                self.session_id = Some(session.id.clone());
                Ok(session)
            }
            Err(e) => {
                let temp_id = format!("temp-{}", unix_millis());
                warn!(error = %e, %temp_id, "session creation failed, using temporary id");
                self.session_id = Some(temp_id);
                Err(e.into())
            }
        }
    }

    /// Switch to an existing session and load its history.
    pub async fn select_session(&mut self, session_id: &str) -> Result<(), ConversationError> {
        self.session_id = Some(session_id.to_string());
        self.messages.clear();

        let history = self.api.get_messages(session_id).await?;
        self.messages = history.into_iter().map(ChatMessage::from).collect();
        Ok(())
    }

    /// Send `input` and stream the reply into the message list.
    ///
    /// The user message and an empty assistant message are appended first; the
    /// assistant message then grows token by token. On a transport failure it
    /// is replaced with [`TRANSPORT_ERROR_MESSAGE`] and the error is returned.
    /// A cancelled or dropped send keeps whatever was received so far.
    pub async fn send(
        &mut self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ConversationError> {
        if input.trim().is_empty() {
            return Err(ConversationError::EmptyInput);
        }
        let session_id = self.session_id.clone().ok_or(ConversationError::NoSession)?;

        self.messages.push(ChatMessage::user(input));
        self.messages.push(ChatMessage::assistant(""));

        let Some(reply) = self.messages.last_mut() else {
            return Ok(());
        };
        let mut observer = ReplyObserver {
            reply,
            failure: None,
        };

        self.api
            .stream_message(&session_id, input, &mut observer, cancel)
            .await;

        match observer.failure {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    /// Plain-text rendering of the conversation.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .join("\n\n")
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
