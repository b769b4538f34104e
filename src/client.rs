//! Core client trait and error types.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model::{SendMessageResponse, Session, SessionMessage, StreamEvent};
use crate::stream::{EventCollector, StreamObserver, StreamOutcome};

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Stream cancelled")]
    StreamCancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Operations offered by the chat backend.
///
/// [`ChatClient`](crate::backend::ChatClient) talks to the real server over
/// HTTP; tests and embedders can provide their own implementation.
///
/// # Required Methods
/// - session management: `create_session`, `list_sessions`, `get_messages`, `delete_session`
/// - `send_message`: legacy request/response send
/// - `stream_message`: streaming send, reported through a [`StreamObserver`]
///
/// # Provided Methods
/// - `stream_events`: streaming send collected into a single `Result`
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Create a new, empty session.
    async fn create_session(&self) -> Result<Session, ClientError>;

    /// List the caller's sessions, most recently updated first.
    async fn list_sessions(&self) -> Result<Vec<Session>, ClientError>;

    /// Fetch a session's message history in chronological order.
    async fn get_messages(&self, session_id: &str) -> Result<Vec<SessionMessage>, ClientError>;

    /// Delete a session and its messages.
    async fn delete_session(&self, session_id: &str) -> Result<(), ClientError>;

    /// Send a message and wait for the whole reply.
    async fn send_message(
        &self,
        session_id: &str,
        content: &str,
    ) -> Result<SendMessageResponse, ClientError>;

    /// Send a message and stream the reply.
    ///
    /// Every parsed event is handed to `observer.on_chunk` in arrival order.
    /// The call then ends with exactly one of `on_done` or `on_error`, and the
    /// returned outcome says which. Cancelling `cancel` stops the read loop and
    /// reports `ClientError::StreamCancelled`.
    async fn stream_message(
        &self,
        session_id: &str,
        content: &str,
        observer: &mut (dyn StreamObserver + Send),
        cancel: &CancellationToken,
    ) -> StreamOutcome;

    /// Stream a reply and collect every event.
    ///
    /// This is a convenience wrapper around `stream_message` for callers that
    /// do not need incremental updates.
    async fn stream_events(
        &self,
        session_id: &str,
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<StreamEvent>, ClientError> {
        let mut collector = EventCollector::default();
        self.stream_message(session_id, content, &mut collector, cancel)
            .await;
        collector.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ClientError::Status {
            status: 404,
            message: "session not found".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404: session not found");
        assert_eq!(ClientError::StreamCancelled.to_string(), "Stream cancelled");
    }
}
