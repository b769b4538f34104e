//! HTTP implementation of [`ChatApi`] for the MAI chat backend.
//!
//! Endpoints, relative to [`ClientOptions::base_url`]:
//!
//! | operation | request |
//! |---|---|
//! | create session | `POST sessions/create/` |
//! | list sessions | `GET sessions/` |
//! | history | `GET sessions/{id}/messages/` |
//! | delete | `DELETE sessions/{id}/delete/` |
//! | send | `POST sessions/{id}/send/` |
//! | stream | `POST sessions/{id}/stream/` (SSE response) |

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ChatApi, ClientError};
use crate::http::{apply_headers, build_http_client};
use crate::model::{
    ErrorBody, MessageHistory, SendMessageRequest, SendMessageResponse, Session, SessionMessage,
};
use crate::options::ClientOptions;
use crate::sse::SSEResponseExt;
use crate::stream::{drive, StreamObserver, StreamOutcome};

/// Chat backend client using HTTP transport.
#[derive(Debug, Clone)]
pub struct ChatClient {
    options: ClientOptions,
    http: reqwest::Client,
}

impl ChatClient {
    /// Create a client from explicit options.
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let http = build_http_client(&options)?;
        Ok(Self { options, http })
    }

    /// Create a client configured from `MAICHAT_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientOptions::from_env()?)
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.options.endpoint(path);
        debug!(%method, %url, "chat backend request");
        apply_headers(self.http.request(method, url), &self.options)
    }

    async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
        let response = Self::check_status(request.send().await?).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "chat backend returned an error status");
        Err(Self::handle_error_response(status, &body))
    }

    /// Map an error response, preferring the backend's `{"error": ...}` text.
    fn handle_error_response(status: StatusCode, body: &str) -> ClientError {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(error_body) => error_body.error,
            Err(_) if body.trim().is_empty() => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
            Err(_) => body.trim().to_string(),
        };

        ClientError::Status {
            status: status.as_u16(),
            message,
        }
    }

    async fn open_stream(
        &self,
        session_id: &str,
        content: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let path = session_path(session_id, "stream/")?;
        let request = self
            .request(Method::POST, &path)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(&SendMessageRequest {
                content: content.to_string(),
            });

        Self::check_status(request.send().await?).await
    }
}

/// Path of a session-scoped endpoint. Rejects empty identifiers.
fn session_path(session_id: &str, action: &str) -> Result<String, ClientError> {
    let session_id = session_id.trim();
    if session_id.is_empty() {
        return Err(ClientError::Config("session id must not be empty".to_string()));
    }
    Ok(format!("sessions/{}/{}", session_id, action))
}

#[async_trait]
impl ChatApi for ChatClient {
    async fn create_session(&self) -> Result<Session, ClientError> {
        let session: Session = Self::fetch_json(self.request(Method::POST, "sessions/create/")).await?;
        info!(session_id = %session.id, "chat session created");
        Ok(session)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, ClientError> {
        Self::fetch_json(self.request(Method::GET, "sessions/")).await
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<SessionMessage>, ClientError> {
        let path = session_path(session_id, "messages/")?;
        let history: MessageHistory = Self::fetch_json(self.request(Method::GET, &path)).await?;
        Ok(history.into_messages())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ClientError> {
        let path = session_path(session_id, "delete/")?;
        Self::check_status(self.request(Method::DELETE, &path).send().await?).await?;
        info!(session_id, "chat session deleted");
        Ok(())
    }

    async fn send_message(
        &self,
        session_id: &str,
        content: &str,
    ) -> Result<SendMessageResponse, ClientError> {
        let path = session_path(session_id, "send/")?;
        let request = self
            .request(Method::POST, &path)
            .header(CONTENT_TYPE, "application/json")
            .json(&SendMessageRequest {
                content: content.to_string(),
            });
        Self::fetch_json(request).await
    }

    async fn stream_message(
        &self,
        session_id: &str,
        content: &str,
        observer: &mut (dyn StreamObserver + Send),
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::StreamCancelled),
            opened = self.open_stream(session_id, content) => opened,
        };

        match opened {
            Ok(response) => drive(response.sse(), observer, cancel).await,
            Err(e) => {
                warn!(error = %e, session_id, "could not open chat stream");
                observer.on_error(e);
                StreamOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_path() {
        assert_eq!(session_path("abc", "stream/").unwrap(), "sessions/abc/stream/");
        assert!(matches!(session_path("  ", "send/"), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_handle_error_response() {
        let err = ChatClient::handle_error_response(
            StatusCode::NOT_FOUND,
            r#"{"error": "session not found"}"#,
        );
        assert!(matches!(
            err,
            ClientError::Status { status: 404, ref message } if message == "session not found"
        ));

        let err = ChatClient::handle_error_response(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert!(matches!(
            err,
            ClientError::Status { status: 502, ref message } if message == "upstream down"
        ));

        let err = ChatClient::handle_error_response(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert!(matches!(
            err,
            ClientError::Status { status: 500, ref message } if message == "Internal Server Error"
        ));
    }

    #[test]
    fn test_new_client_keeps_options() {
        let client = ChatClient::new(ClientOptions::new("http://localhost:8000/mai_chat/api/chat/")).unwrap();
        assert_eq!(client.options().base_url, "http://localhost:8000/mai_chat/api/chat");
    }
}
