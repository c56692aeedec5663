//! End-to-end tests for the MCP client against a mock streamable HTTP server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use folio_mcp::{Connector, HttpConnector, McpClient, McpError, McpServerConfig};

fn sse(body: &serde_json::Value) -> ResponseTemplate {
    let stream = format!(
        "event: message\ndata: {{\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\",\"params\":{{}}}}\n\nevent: message\ndata: {body}\n\n"
    );
    ResponseTemplate::new(200).set_body_raw(stream, "text/event-stream")
}

async fn mount_session(server: &MockServer) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "initialize"})))
        .respond_with(
            sse(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fi-mcp", "version": "0.3.0"}
                }
            }))
            .insert_header("mcp-session-id", "mcp-session-7"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "notifications/initialized"})))
        .respond_with(ResponseTemplate::new(202))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_session_over_sse() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    Mock::given(method("POST"))
        .and(header("mcp-session-id", "mcp-session-7"))
        .and(body_partial_json(json!({
            "method": "tools/call",
            "params": {"name": "fetch_bank_transactions"}
        })))
        .respond_with(sse(&json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {"content": [{"type": "text", "text": "{\"bankTransactions\":[]}"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(header("mcp-session-id", "mcp-session-7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = McpServerConfig::new("fi", format!("{}/mcp/stream", server.uri()))
        .with_timeout(Duration::from_secs(5));
    let client = McpClient::connect(config, None).await.unwrap();

    assert!(client.is_initialized());
    assert_eq!(client.server_info().unwrap().name, "fi-mcp");
    assert_eq!(client.session_id().as_deref(), Some("mcp-session-7"));

    let result = client
        .call_tool("bank:fetch_bank_transactions", None)
        .await
        .unwrap();
    assert_eq!(result.text().as_deref(), Some("{\"bankTransactions\":[]}"));

    client.close().await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_connector_resumes_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(query_param("sessionId", "abc123"))
        .and(body_partial_json(json!({"method": "initialize"})))
        .respond_with(sse(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "protocolVersion": "2025-03-26",
                "serverInfo": {"name": "fi-mcp", "version": "0.3.0"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "notifications/initialized"})))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let connector = HttpConnector::new(McpServerConfig::new("fi", server.uri()));
    let caller = connector.connect(Some("abc123")).await.unwrap();
    caller.close().await.unwrap();
}

#[tokio::test]
async fn test_server_error_surfaces_with_tool_name() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "tools/call"})))
        .respond_with(sse(&json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": {"code": -32602, "message": "unknown tool"}
        })))
        .mount(&server)
        .await;

    let client = McpClient::connect(McpServerConfig::new("fi", server.uri()), None)
        .await
        .unwrap();
    let err = client.call_tool("fetch_lottery", None).await.unwrap_err();

    assert_eq!(err.tool(), Some("fetch_lottery"));
    assert!(matches!(
        err.root(),
        McpError::ServerError { code: -32602, .. }
    ));
}

#[tokio::test]
async fn test_unreachable_server_fails_connect() {
    let config = McpServerConfig::new("fi", "http://127.0.0.1:9/mcp")
        .with_timeout(Duration::from_secs(2));
    let result = McpClient::connect(config, None).await;
    assert!(result.is_err());
}
