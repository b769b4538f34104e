use maichat::model::Role;
use maichat::options::ClientOptions;
use maichat::{ChatApi, ChatClient, ClientError, Conversation};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE: &str = "/mai_chat/api/chat";

fn client_for(server: &MockServer) -> ChatClient {
    let options = ClientOptions::new(format!("{}{}", server.uri(), BASE)).with_auth_token("secret-token");
    ChatClient::new(options).unwrap()
}

#[tokio::test]
async fn create_session_parses_descriptor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/sessions/create/", BASE)))
        .and(header("authorization", "Token secret-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "session_id": "9a1c6f0e-0000-4000-8000-000000000001",
            "created_at": "2024-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client_for(&server).create_session().await.unwrap();

    assert_eq!(session.id, "9a1c6f0e-0000-4000-8000-000000000001");
    assert_eq!(session.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
}

#[tokio::test]
async fn list_sessions_keeps_order_and_extra_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/sessions/", BASE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "b", "created_at": "2024-01-02T00:00:00Z", "title": "보스 공략"},
            {"id": "a", "created_at": "2024-01-01T00:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let sessions = client_for(&server).list_sessions().await.unwrap();

    assert_eq!(sessions.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);
    assert_eq!(sessions[0].extra["title"], "보스 공략");
}

#[tokio::test]
async fn get_messages_reads_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/sessions/s1/messages/", BASE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"is_user": true, "content": "아델 스킬?"},
            {"role": "assistant", "content": "아델은...", "thinking": "직업 문서 검색"}
        ])))
        .mount(&server)
        .await;

    let messages = client_for(&server).get_messages("s1").await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].thinking.as_deref(), Some("직업 문서 검색"));
}

#[tokio::test]
async fn delete_session_maps_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/sessions/gone/delete/", BASE)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "세션을 찾을 수 없습니다."})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/sessions/s1/delete/", BASE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "deleted", "session_id": "s1"})))
        .mount(&server)
        .await;

    let client = client_for(&server);

    client.delete_session("s1").await.unwrap();
    match client.delete_session("gone").await {
        Err(ClientError::Status { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "세션을 찾을 수 없습니다.");
        }
        other => panic!("expected a 404, got {:?}", other),
    }
}

#[tokio::test]
async fn send_message_returns_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/sessions/s1/send/", BASE)))
        .and(body_json(json!({"content": "hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_message": {"content": "hi"},
            "ai_message": {"content": "hello"}
        })))
        .mount(&server)
        .await;

    let response = client_for(&server).send_message("s1", "hi").await.unwrap();

    assert_eq!(response.ai_message.content, "hello");
    assert!(response.extra.contains_key("user_message"));
}

#[tokio::test]
async fn conversation_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/sessions/", BASE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/sessions/create/", BASE)))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "s1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/sessions/s1/stream/", BASE)))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"type\":\"token\",\"content\":\"리부트 \"}\n\ndata: {\"type\":\"token\",\"content\":\"서버\"}\n\ndata: [DONE]\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let mut conversation = Conversation::new(client_for(&server));
    conversation.resume_or_create().await.unwrap();
    conversation
        .send("어디서 시작해?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(conversation.session_id(), Some("s1"));
    assert_eq!(conversation.messages()[1].content, "리부트 서버");
}
