use std::sync::Arc;

use maichat::options::ClientOptions;
use maichat::{
    spawn_stream, ChatApi, ChatClient, ClientError, EventKind, StreamEvent, StreamObserver,
    StreamOutcome, StreamUpdate,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STREAM_PATH: &str = "/mai_chat/api/chat/sessions/abc/stream/";

#[derive(Debug, PartialEq)]
enum Call {
    Chunk(StreamEvent),
    Done,
    Error(String),
}

#[derive(Default)]
struct Recorder {
    calls: Vec<Call>,
}

impl StreamObserver for Recorder {
    fn on_chunk(&mut self, event: StreamEvent) {
        self.calls.push(Call::Chunk(event));
    }

    fn on_done(&mut self) {
        self.calls.push(Call::Done);
    }

    fn on_error(&mut self, error: ClientError) {
        self.calls.push(Call::Error(error.to_string()));
    }
}

fn client_for(server: &MockServer) -> ChatClient {
    ChatClient::new(ClientOptions::new(format!("{}/mai_chat/api/chat", server.uri()))).unwrap()
}

async fn serve_stream(server: &MockServer, body: &str) {
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream"))
        .mount(server)
        .await;
}

async fn stream(client: &ChatClient, content: &str) -> (StreamOutcome, Vec<Call>) {
    let mut recorder = Recorder::default();
    let outcome = client
        .stream_message("abc", content, &mut recorder, &CancellationToken::new())
        .await;
    (outcome, recorder.calls)
}

#[tokio::test]
async fn streams_tokens_until_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"content": "안녕"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"type\":\"token\",\"content\":\"Hel\"}\n\ndata: {\"type\":\"token\",\"content\":\"lo\"}\n\ndata: [DONE]\n\n",
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (outcome, calls) = stream(&client_for(&server), "안녕").await;

    assert_eq!(outcome, StreamOutcome::Done);
    assert_eq!(
        calls,
        vec![
            Call::Chunk(StreamEvent::token("Hel")),
            Call::Chunk(StreamEvent::token("lo")),
            Call::Done,
        ]
    );
}

#[tokio::test]
async fn error_status_reports_only_on_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "서버 오류가 발생했습니다."})))
        .mount(&server)
        .await;

    let (outcome, calls) = stream(&client_for(&server), "hi").await;

    assert_eq!(outcome, StreamOutcome::Failed);
    assert_eq!(calls, vec![Call::Error("HTTP 500: 서버 오류가 발생했습니다.".to_string())]);
}

#[tokio::test]
async fn malformed_frame_is_dropped() {
    let server = MockServer::start().await;
    serve_stream(
        &server,
        "data: not-json\n\ndata: {\"type\":\"token\",\"content\":\"ok\"}\n\ndata: [DONE]\n\n",
    )
    .await;

    let (outcome, calls) = stream(&client_for(&server), "hi").await;

    assert_eq!(outcome, StreamOutcome::Done);
    assert_eq!(calls, vec![Call::Chunk(StreamEvent::token("ok")), Call::Done]);
}

#[tokio::test]
async fn missing_done_marker_still_completes() {
    let server = MockServer::start().await;
    serve_stream(
        &server,
        "data: {\"type\":\"token\",\"content\":\"a\"}\n\ndata: {\"type\":\"error\",\"content\":\"timeout\"}",
    )
    .await;

    let (outcome, calls) = stream(&client_for(&server), "hi").await;

    assert_eq!(outcome, StreamOutcome::Done);
    assert_eq!(
        calls,
        vec![
            Call::Chunk(StreamEvent::token("a")),
            Call::Chunk(StreamEvent::error("timeout")),
            Call::Done,
        ]
    );
}

#[tokio::test]
async fn unreachable_server_reports_error() {
    let client = ChatClient::new(ClientOptions::new("http://127.0.0.1:9/mai_chat/api/chat")).unwrap();

    let (outcome, calls) = stream(&client, "hi").await;

    assert_eq!(outcome, StreamOutcome::Failed);
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], Call::Error(_)));
}

#[tokio::test]
async fn cancelled_before_request_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut recorder = Recorder::default();
    let outcome = client_for(&server)
        .stream_message("abc", "hi", &mut recorder, &cancel)
        .await;

    assert_eq!(outcome, StreamOutcome::Failed);
    assert_eq!(recorder.calls, vec![Call::Error("Stream cancelled".to_string())]);
}

#[tokio::test]
async fn empty_session_id_is_rejected() {
    let server = MockServer::start().await;
    let mut recorder = Recorder::default();

    let outcome = client_for(&server)
        .stream_message("", "hi", &mut recorder, &CancellationToken::new())
        .await;

    assert_eq!(outcome, StreamOutcome::Failed);
    assert_eq!(recorder.calls.len(), 1);
}

#[tokio::test]
async fn stream_events_collects_everything() {
    let server = MockServer::start().await;
    serve_stream(
        &server,
        "data: {\"type\":\"token\",\"content\":\"a\"}\n\ndata: {\"type\":\"sources\",\"content\":\"\",\"docs\":[1]}\n\ndata: [DONE]\n\n",
    )
    .await;

    let events = client_for(&server)
        .stream_events("abc", "hi", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[1].kind, EventKind::Other("sources".to_string()));
    assert_eq!(events[1].extra["docs"], json!([1]));
}

#[tokio::test]
async fn spawned_stream_delivers_updates_in_order() {
    let server = MockServer::start().await;
    serve_stream(
        &server,
        "data: {\"type\":\"token\",\"content\":\"메이플\"}\n\ndata: {\"type\":\"token\",\"content\":\"스토리\"}\n\ndata: [DONE]\n\n",
    )
    .await;

    let mut handle = spawn_stream(Arc::new(client_for(&server)), "abc".to_string(), "hi".to_string());
    let mut reply = String::new();
    let mut terminals = 0;

    while let Some(update) = handle.next_update().await {
        if update.is_terminal() {
            terminals += 1;
        }
        match update {
            StreamUpdate::Chunk(event) => reply.push_str(&event.content),
            StreamUpdate::Done => {}
            StreamUpdate::Error(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(reply, "메이플스토리");
    assert_eq!(terminals, 1);
    assert_eq!(handle.join().await.unwrap(), StreamOutcome::Done);
}

#[tokio::test]
async fn spawned_stream_can_be_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: [DONE]\n\n", "text/event-stream")
                .set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let mut handle = spawn_stream(Arc::new(client_for(&server)), "abc".to_string(), "hi".to_string());
    handle.cancel();

    match handle.next_update().await {
        Some(StreamUpdate::Error(ClientError::StreamCancelled)) => {}
        other => panic!("expected cancellation, got {:?}", other),
    }
    assert!(handle.next_update().await.is_none());
    assert_eq!(handle.join().await.unwrap(), StreamOutcome::Failed);
}
