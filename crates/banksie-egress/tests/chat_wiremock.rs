//! Integration tests for the chat connector using wiremock
//!
//! These tests mock the chat backend to verify the connector's HTTP behavior.

use banksie_core::StreamError;
use banksie_egress::{
    chat::{ChatClient, ChatClientConfig},
    client::HttpClientConfig,
    EgressError,
};
use futures::StreamExt;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn client_for(server: &MockServer) -> ChatClient {
    let config = ChatClientConfig::new(server.uri()).with_token("test-token");
    ChatClient::new(config).unwrap()
}

#[tokio::test]
async fn test_login_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(serde_json::json!({
            "username": "admin",
            "password": "password123"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": "jwt-abc",
            "user": {"id": 1, "username": "admin", "email": "admin@example.com"}
        })))
        .mount(&mock_server)
        .await;

    let client = ChatClient::new(ChatClientConfig::new(mock_server.uri())).unwrap();
    let login = client.login("admin", "password123").await.unwrap();

    assert_eq!(login.token, "jwt-abc");
    assert_eq!(login.user.username, "admin");
    assert_eq!(login.user.email.as_deref(), Some("admin@example.com"));
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({"detail": "Invalid credentials"})),
        )
        .mount(&mock_server)
        .await;

    let client = ChatClient::new(ChatClientConfig::new(mock_server.uri())).unwrap();
    let result = client.login("admin", "wrong").await;

    match result {
        Err(EgressError::BackendError {
            status_code,
            message,
        }) => {
            assert_eq!(status_code, 401);
            assert!(message.contains("Invalid credentials"));
        }
        other => panic!("expected backend error, got {:?}", other.map(|l| l.token)),
    }
}

#[tokio::test]
async fn test_history_sends_bearer_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/chat/history"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 1, "user_id": 1, "message": "hi", "response": "hello", "created_at": "2025-01-01 10:00:00"},
            {"id": 2, "user_id": 1, "message": "data?", "response": "sure", "created_at": "2025-01-01 10:01:00"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let entries = client_for(&mock_server).history().await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "hi");
    assert_eq!(entries[1].response, "sure");
}

#[tokio::test]
async fn test_history_retries_transient_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/chat/history"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/chat/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;

    let entries = client_for(&mock_server).history().await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_open_stream_yields_body_chunks() {
    let mock_server = MockServer::start().await;

    let body = "data: {\"chunk\": \"Hi\", \"done\": false}\n\ndata: {\"done\": true}\n\n";
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("accept", "text/event-stream"))
        .and(body_json(serde_json::json!({"message": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server)
        .await;

    let mut stream = client_for(&mock_server).open_stream("hello").await.unwrap();

    let mut received = Vec::new();
    while let Some(chunk) = stream.next().await {
        received.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(String::from_utf8(received).unwrap(), body);
}

#[tokio::test]
async fn test_open_stream_non_success_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let result = client_for(&mock_server).open_stream("hello").await;

    match result {
        Err(EgressError::BackendError { status_code, .. }) => assert_eq!(status_code, 500),
        Err(other) => panic!("expected backend error, got {}", other),
        Ok(_) => panic!("expected backend error, got a stream"),
    }
}

#[tokio::test]
async fn test_open_stream_server_unreachable() {
    // Bind then drop a plain listener so nothing accepts on the port
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let config = ChatClientConfig::new(uri)
        .with_token("test-token")
        .with_client_config(HttpClientConfig {
            connect_timeout_secs: 2,
            ..Default::default()
        });
    let client = ChatClient::new(config).unwrap();

    let err = match client.open_stream("hello").await {
        Err(e) => StreamError::from(e),
        Ok(_) => panic!("expected connection failure"),
    };
    assert!(matches!(err, StreamError::ServerUnreachable(_)));
}

#[tokio::test]
async fn test_request_timeout_maps_to_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: {\"done\": true}\n\n", "text/event-stream")
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let config = ChatClientConfig::new(mock_server.uri())
        .with_token("test-token")
        .with_client_config(HttpClientConfig {
            request_timeout_secs: 1,
            ..Default::default()
        });
    let client = ChatClient::new(config).unwrap();

    match client.open_stream("hello").await {
        Err(EgressError::Timeout(secs)) => assert_eq!(secs, 1),
        Err(other) => panic!("expected timeout, got {}", other),
        Ok(_) => panic!("expected timeout, got a stream"),
    }
}
