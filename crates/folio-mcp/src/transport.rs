//! Streamable HTTP transport for MCP communication.
//!
//! Every JSON-RPC message is POSTed to a single endpoint. The server answers
//! a request either with a plain JSON body or with a `text/event-stream`
//! whose events carry JSON-RPC messages; the response is the first event
//! whose id matches the request. The `Mcp-Session-Id` header handed out on
//! `initialize` is echoed on every later request and released with a
//! `DELETE` when the connection closes.

use std::time::Duration;

use futures::StreamExt;
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use url::Url;

use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Header carrying the server-assigned session id.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Header carrying the negotiated protocol version.
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Query parameter used to reattach to a session that completed login
/// out of band.
pub const RESUME_QUERY_PARAM: &str = "sessionId";

/// Configuration for HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Endpoint URL of the MCP server.
    pub url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Remote session to reattach to, sent as the `sessionId` query parameter.
    pub resume_session: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(30),
            headers: Vec::new(),
            resume_session: None,
        }
    }
}

impl HttpTransportConfig {
    /// Create a new HTTP transport config with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Reattach to an existing remote session.
    pub fn with_resume_session(mut self, session: impl Into<String>) -> Self {
        self.resume_session = Some(session.into());
        self
    }

    /// Resolve the endpoint URL, appending the resume parameter if set.
    pub fn endpoint(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| McpError::transport(format!("invalid URL: {}", e)))?;
        if let Some(session) = &self.resume_session {
            url.query_pairs_mut()
                .append_pair(RESUME_QUERY_PARAM, session);
        }
        Ok(url)
    }
}

/// Streamable HTTP transport. Safe to share between concurrent callers.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    headers: Vec<(String, String)>,
    session_id: RwLock<Option<String>>,
    protocol_version: RwLock<Option<String>>,
}

impl HttpTransport {
    /// Create a new HTTP transport. No request is sent until the first message.
    pub fn connect(config: HttpTransportConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| McpError::transport(format!("failed to build HTTP client: {}", e)))?;

        tracing::debug!(
            url = %endpoint,
            timeout_secs = config.timeout.as_secs(),
            resume = config.resume_session.is_some(),
            "created HTTP transport"
        );

        Ok(Self {
            client,
            endpoint,
            headers: config.headers,
            session_id: RwLock::new(None),
            protocol_version: RwLock::new(None),
        })
    }

    /// The resolved endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Server-assigned session id, once `initialize` has been answered.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Record the protocol version negotiated during `initialize`.
    pub fn set_protocol_version(&self, version: impl Into<String>) {
        *self.protocol_version.write() = Some(version.into());
    }

    fn apply_headers(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (key, value) in &self.headers {
            req = req.header(key, value);
        }
        if let Some(session) = self.session_id.read().as_deref() {
            req = req.header(SESSION_HEADER, session);
        }
        if let Some(version) = self.protocol_version.read().as_deref() {
            req = req.header(PROTOCOL_VERSION_HEADER, version);
        }
        req
    }

    fn post(&self, body: String) -> reqwest::RequestBuilder {
        let req = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .body(body);
        self.apply_headers(req)
    }

    fn capture_session(&self, response: &reqwest::Response) {
        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut current = self.session_id.write();
            if current.as_deref() != Some(session) {
                tracing::debug!(session = %session, "MCP session assigned");
                *current = Some(session.to_string());
            }
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(McpError::HttpStatus { status, body })
    }

    /// Send a JSON-RPC request and wait for the response.
    pub async fn send_request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let json = serde_json::to_string(request)?;

        tracing::trace!(
            url = %self.endpoint,
            id = request.id,
            method = %request.method,
            "sending MCP HTTP request"
        );

        let response = self.post(json).send().await?;
        let response = Self::check_status(response).await?;
        self.capture_session(&response);

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if is_event_stream_content_type(&content_type) {
            read_sse_response(response, request.id).await
        } else {
            let body = response.text().await?;
            tracing::trace!(id = request.id, json = %body, "received MCP HTTP response");
            if body.trim().is_empty() {
                return Err(McpError::protocol(format!(
                    "empty response body for request {}",
                    request.id
                )));
            }
            Ok(serde_json::from_str(&body)?)
        }
    }

    /// Send a JSON-RPC notification (no response expected).
    pub async fn send_notification(&self, notification: &JsonRpcNotification) -> Result<()> {
        let json = serde_json::to_string(notification)?;
        let response = self.post(json).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Release the server-side session.
    ///
    /// Idempotent. `405` (termination unsupported) and `404` (session
    /// already gone) count as released.
    pub async fn terminate(&self) -> Result<()> {
        let Some(session) = self.session_id.write().take() else {
            return Ok(());
        };

        let req = self
            .client
            .delete(self.endpoint.clone())
            .header(SESSION_HEADER, &session);
        let response = req.send().await?;
        let status = response.status();
        if status.is_success()
            || status == reqwest::StatusCode::METHOD_NOT_ALLOWED
            || status == reqwest::StatusCode::NOT_FOUND
        {
            tracing::debug!(session = %session, "MCP session released");
            Ok(())
        } else {
            Err(McpError::HttpStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Read an SSE stream until the response to `id` arrives.
async fn read_sse_response(response: reqwest::Response, id: u64) -> Result<JsonRpcResponse> {
    let mut stream = response.bytes_stream();
    let mut buffer = SseLineBuffer::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for line in buffer.push(&chunk) {
            if let Some(response) = decode_sse_line(&line, id)? {
                return Ok(response);
            }
        }
    }

    for line in buffer.finish() {
        if let Some(response) = decode_sse_line(&line, id)? {
            return Ok(response);
        }
    }

    Err(McpError::ConnectionClosed)
}

fn decode_sse_line(line: &str, id: u64) -> Result<Option<JsonRpcResponse>> {
    let Some(payload) = sse_data_payload(line) else {
        return Ok(None);
    };
    if payload.is_empty() {
        return Ok(None);
    }

    let message: serde_json::Value = match serde_json::from_str(payload) {
        Ok(message) => message,
        Err(e) => {
            tracing::trace!(data = %payload, error = %e, "skipping non-JSON MCP stream data");
            return Ok(None);
        }
    };
    if JsonRpcResponse::matches(&message, id) {
        return Ok(Some(serde_json::from_value(message)?));
    }

    tracing::trace!(json = %payload, "skipping unrelated MCP stream message");
    Ok(None)
}

/// Whether a `Content-Type` value denotes an SSE stream.
pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

/// Payload of an SSE `data:` line.
pub fn sse_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Splits an SSE byte stream into complete, non-empty lines.
#[derive(Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    /// Add a chunk, returning every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        self.drain_lines(false)
    }

    /// Flush whatever remains at end of stream.
    pub fn finish(&mut self) -> Vec<String> {
        self.drain_lines(true)
    }

    fn drain_lines(&mut self, flush: bool) -> Vec<String> {
        let mut lines = Vec::new();
        let mut start = 0;

        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if let Ok(text) = std::str::from_utf8(&self.buffer[start..end]) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
            }
            start = end + 1;
        }

        if flush {
            if let Ok(text) = std::str::from_utf8(&self.buffer[start..]) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
            }
            self.buffer.clear();
        } else if start > 0 {
            self.buffer.drain(..start);
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_http_transport_config() {
        let config = HttpTransportConfig::new("http://localhost:8080/mcp/stream")
            .with_timeout(Duration::from_secs(60))
            .with_header("Authorization", "Bearer token123");

        assert_eq!(config.url, "http://localhost:8080/mcp/stream");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(
            config.headers,
            vec![("Authorization".to_string(), "Bearer token123".to_string())]
        );
        assert!(config.resume_session.is_none());
    }

    #[test]
    fn test_endpoint_with_resume_session() {
        let config = HttpTransportConfig::new("http://localhost:8080/mcp/stream")
            .with_resume_session("abc123");
        let url = config.endpoint().unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/mcp/stream?sessionId=abc123");
    }

    #[test]
    fn test_http_transport_invalid_url() {
        let result = HttpTransport::connect(HttpTransportConfig::new("not a valid url"));
        match result {
            Err(McpError::Transport(msg)) => assert!(msg.contains("invalid URL")),
            _ => panic!("Expected Transport error"),
        }
    }

    #[test]
    fn sse_buffer_handles_partial_lines() {
        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(b"data: one").is_empty());
        assert_eq!(buffer.push(b"\r\n\n"), vec!["data: one"]);
        assert!(buffer.push(b"data: two").is_empty());
        assert_eq!(buffer.finish(), vec!["data: two"]);
    }

    #[test]
    fn detects_event_stream_content_type() {
        assert!(is_event_stream_content_type("text/event-stream; charset=utf-8"));
        assert!(!is_event_stream_content_type("application/json"));
    }

    #[test]
    fn extracts_sse_payload() {
        assert_eq!(sse_data_payload("data: {\"id\":1}"), Some("{\"id\":1}"));
        assert_eq!(sse_data_payload("event: message"), None);
    }

    #[tokio::test]
    async fn test_json_response_and_session_capture() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(SESSION_HEADER, "sess-1")
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": true}})),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::connect(HttpTransportConfig::new(server.uri())).unwrap();
        let response = transport
            .send_request(&JsonRpcRequest::new(1, "ping", None))
            .await
            .unwrap();

        assert_eq!(response.into_result().unwrap(), json!({"ok": true}));
        assert_eq!(transport.session_id().as_deref(), Some("sess-1"));
    }

    #[tokio::test]
    async fn test_sse_response_skips_notifications() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\n",
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":4,\"result\":{\"content\":[]}}\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::connect(HttpTransportConfig::new(server.uri())).unwrap();
        let response = transport
            .send_request(&JsonRpcRequest::new(4, "tools/call", None))
            .await
            .unwrap();
        assert_eq!(response.id, Some(4));
        assert_eq!(response.into_result().unwrap(), json!({"content": []}));
    }

    #[test]
    fn test_sse_keep_alive_data_is_skipped() {
        assert!(decode_sse_line("data: ping", 7).unwrap().is_none());
        assert!(decode_sse_line("data: {\"jsonrpc\"", 7).unwrap().is_none());
        let response = decode_sse_line("data: {\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{}}", 7)
            .unwrap()
            .unwrap();
        assert_eq!(response.id, Some(7));
    }

    #[tokio::test]
    async fn test_sse_response_after_keep_alive() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: ping\n",
            "data: ping\n\n",
            "data: keep-alive\n\n",
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"ok\":true}}\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let transport = HttpTransport::connect(HttpTransportConfig::new(server.uri())).unwrap();
        let response = transport
            .send_request(&JsonRpcRequest::new(2, "tools/call", None))
            .await
            .unwrap();
        assert_eq!(response.into_result().unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_sse_stream_without_response_is_closed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "event: message\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"x\"}\n\n",
                    "text/event-stream",
                ),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::connect(HttpTransportConfig::new(server.uri())).unwrap();
        let err = transport
            .send_request(&JsonRpcRequest::new(1, "tools/call", None))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let transport = HttpTransport::connect(HttpTransportConfig::new(server.uri())).unwrap();
        let err = transport
            .send_request(&JsonRpcRequest::new(1, "ping", None))
            .await
            .unwrap_err();
        match err {
            McpError::HttpStatus { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "unavailable");
            }
            other => panic!("Expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop a listener so the port is known to be closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport =
            HttpTransport::connect(HttpTransportConfig::new(format!("http://{addr}/mcp")))
                .unwrap();
        let err = transport
            .send_request(&JsonRpcRequest::new(1, "ping", None))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Transport(_)));
    }

    #[tokio::test]
    async fn test_resume_session_query_param_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param(RESUME_QUERY_PARAM, "abc123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = HttpTransportConfig::new(format!("{}/mcp/stream", server.uri()))
            .with_resume_session("abc123");
        let transport = HttpTransport::connect(config).unwrap();
        transport
            .send_request(&JsonRpcRequest::new(1, "ping", None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_terminate_sends_delete_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(SESSION_HEADER, "sess-9")
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(header(SESSION_HEADER, "sess-9"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::connect(HttpTransportConfig::new(server.uri())).unwrap();
        transport
            .send_request(&JsonRpcRequest::new(1, "initialize", None))
            .await
            .unwrap();

        transport.terminate().await.unwrap();
        transport.terminate().await.unwrap();
        assert!(transport.session_id().is_none());
    }
}
