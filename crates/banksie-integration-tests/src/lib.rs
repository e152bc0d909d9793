//! End-to-end test support for Banksie
//!
//! Helpers for standing up a mocked chat backend and pointing the real
//! connector, session and conversation layers at it.

use banksie_core::ResponderSource;
use banksie_egress::chat::{ChatClient, ChatClientConfig};
use banksie_egress::client::HttpClientConfig;
use serde_json::Value;
use std::sync::Arc;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const TEST_TOKEN: &str = "test-token";

/// Encode records as an event-stream body, one `data: ` line per record
pub fn event_body(records: &[Value]) -> String {
    records
        .iter()
        .map(|record| format!("data: {}\n\n", record))
        .collect()
}

/// Mount a chat stream endpoint answering with `template`
pub async fn mount_stream(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .and(header("authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Mount a chat stream endpoint answering 200 with the given records
pub async fn mount_events(server: &MockServer, records: &[Value]) {
    let body = event_body(records);
    mount_stream(
        server,
        ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"),
    )
    .await;
}

/// Authenticated connector for the mock backend
pub fn connect(server: &MockServer) -> Arc<ChatClient> {
    connect_with(server, HttpClientConfig::default())
}

pub fn connect_with(server: &MockServer, client_config: HttpClientConfig) -> Arc<ChatClient> {
    let config = ChatClientConfig::new(server.uri())
        .with_token(TEST_TOKEN)
        .with_client_config(client_config);
    match ChatClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(e) => panic!("failed to build test client: {}", e),
    }
}

/// Authenticated connector for an address where nothing is listening
pub fn connect_closed_port() -> Arc<ChatClient> {
    let addr = match std::net::TcpListener::bind("127.0.0.1:0") {
        Ok(listener) => match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => panic!("failed to read listener address: {}", e),
        },
        Err(e) => panic!("failed to bind test listener: {}", e),
    };

    let config = ChatClientConfig::new(format!("http://{}", addr)).with_token(TEST_TOKEN);
    match ChatClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(e) => panic!("failed to build test client: {}", e),
    }
}

/// Same connector viewed through the session seam
pub fn source(client: &Arc<ChatClient>) -> Arc<dyn ResponderSource> {
    client.clone()
}
