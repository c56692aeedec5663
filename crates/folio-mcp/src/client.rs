//! MCP client for communicating with a remote MCP server.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::caller::{Connector, ToolCaller};
use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, ServerInfo,
};
use crate::transport::{HttpTransport, HttpTransportConfig};

/// Delimiter between an optional service prefix and the tool name.
pub const NAMESPACE_DELIMITER: char = ':';

/// Configuration for an MCP server connection.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Name for this server (used in logs).
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// HTTP headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

impl McpServerConfig {
    /// Create a new server config.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            headers: Vec::new(),
            timeout: None,
        }
    }

    /// Add an HTTP header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn transport_config(&self, resume_session: Option<&str>) -> HttpTransportConfig {
        let mut config = HttpTransportConfig::new(&self.url);
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        for (key, value) in &self.headers {
            config = config.with_header(key, value);
        }
        if let Some(session) = resume_session {
            config = config.with_resume_session(session);
        }
        config
    }
}

/// Strip an optional `service:` prefix and validate what remains.
///
/// ```
/// use folio_mcp::client::bare_tool_name;
/// assert_eq!(bare_tool_name("networth:fetch_net_worth").unwrap(), "fetch_net_worth");
/// assert_eq!(bare_tool_name("fetch_net_worth").unwrap(), "fetch_net_worth");
/// assert!(bare_tool_name("networth:").is_err());
/// ```
pub fn bare_tool_name(name: &str) -> Result<&str> {
    let bare = match name.rsplit_once(NAMESPACE_DELIMITER) {
        Some((_, tool)) => tool,
        None => name,
    };
    if bare.is_empty() || bare.chars().any(char::is_whitespace) {
        return Err(McpError::InvalidToolName(name.to_string()));
    }
    Ok(bare)
}

/// An MCP client connected to a single MCP server.
///
/// Dropping an open client releases the server session in the background,
/// so a cancelled caller never leaks it; [`McpClient::close`] does the same
/// synchronously.
pub struct McpClient {
    /// Server configuration.
    config: McpServerConfig,
    /// Transport for communicating with the server.
    transport: Arc<HttpTransport>,
    /// Server info (after initialization).
    server_info: Option<ServerInfo>,
    /// Counter for generating unique request IDs.
    request_id: AtomicU64,
    /// Whether the client has been initialized.
    initialized: bool,
    /// Set once the session has been released.
    closed: AtomicBool,
}

impl McpClient {
    /// Create a client without contacting the server.
    ///
    /// Call [`McpClient::initialize`] before calling tools.
    pub fn new(config: McpServerConfig, resume_session: Option<&str>) -> Result<Self> {
        let transport = HttpTransport::connect(config.transport_config(resume_session))?;

        tracing::info!(
            server = %config.name,
            url = %transport.endpoint(),
            "connected to MCP server via HTTP"
        );

        Ok(Self {
            config,
            transport: Arc::new(transport),
            server_info: None,
            request_id: AtomicU64::new(1),
            initialized: false,
            closed: AtomicBool::new(false),
        })
    }

    /// Create a client and perform the initialize handshake.
    pub async fn connect(config: McpServerConfig, resume_session: Option<&str>) -> Result<Self> {
        let mut client = Self::new(config, resume_session)?;
        client.initialize().await?;
        Ok(client)
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get the server info (after initialization).
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Check if the client has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Server-assigned session id.
    pub fn session_id(&self) -> Option<String> {
        self.transport.session_id()
    }

    /// Get the next request ID.
    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a request and get the response.
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::ConnectionClosed);
        }

        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        let response = self.transport.send_request(&request).await?;

        response
            .into_result()
            .map_err(|e| McpError::server_error(e.code, e.message, e.data))
    }

    /// Initialize the connection with the MCP server.
    ///
    /// Exchanges protocol versions and captures the server session id.
    pub async fn initialize(&mut self) -> Result<&ServerInfo> {
        if !self.initialized {
            let params = InitializeParams::default();
            let result = self
                .send_request("initialize", Some(serde_json::to_value(&params)?))
                .await?;
            let init_result: InitializeResult = serde_json::from_value(result)?;

            tracing::info!(
                server = %init_result.server_info.name,
                version = %init_result.server_info.version,
                protocol = %init_result.protocol_version,
                session = ?self.transport.session_id(),
                "MCP server initialized"
            );

            self.transport
                .set_protocol_version(init_result.protocol_version.clone());
            self.transport
                .send_notification(&JsonRpcNotification::new("notifications/initialized", None))
                .await?;

            self.server_info = Some(init_result.server_info);
            self.initialized = true;
        }

        self.server_info.as_ref().ok_or(McpError::NotInitialized)
    }

    /// Call a tool on the server.
    ///
    /// Errors carry `name` as given, so namespaced names survive into
    /// diagnostics even though only the bare name goes over the wire.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        self.call_tool_inner(name, arguments)
            .await
            .map_err(|e| McpError::tool_call(name, e))
    }

    async fn call_tool_inner(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        if !self.initialized {
            return Err(McpError::NotInitialized);
        }

        let bare = bare_tool_name(name)?;
        let params = CallToolParams {
            name: bare.to_string(),
            arguments,
        };

        let result = self
            .send_request("tools/call", Some(serde_json::to_value(&params)?))
            .await?;
        let call_result: CallToolResult = serde_json::from_value(result)?;

        if call_result.is_error() {
            tracing::warn!(server = %self.config.name, tool = %bare, "tool call returned error");
        } else {
            tracing::debug!(server = %self.config.name, tool = %bare, "tool call succeeded");
        }

        Ok(call_result)
    }

    /// Release the server session. Later calls fail with `ConnectionClosed`.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(server = %self.config.name, "closing MCP client");
        self.transport.terminate().await
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) || self.transport.session_id().is_none() {
            return;
        }
        // Drop cannot await; hand the release to the runtime if there is one.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let transport = Arc::clone(&self.transport);
            let server = self.config.name.clone();
            handle.spawn(async move {
                if let Err(e) = transport.terminate().await {
                    tracing::debug!(server = %server, error = %e, "failed to release MCP session");
                }
            });
        }
    }
}

#[async_trait]
impl ToolCaller for McpClient {
    async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        McpClient::call_tool(self, name, arguments).await
    }

    fn session_id(&self) -> Option<String> {
        McpClient::session_id(self)
    }

    async fn close(&self) -> Result<()> {
        McpClient::close(self).await
    }
}

/// [`Connector`] that opens [`McpClient`]s over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    config: McpServerConfig,
}

impl HttpConnector {
    /// Create a connector for the given server.
    pub fn new(config: McpServerConfig) -> Self {
        Self { config }
    }

    /// The server configuration.
    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, resume_session: Option<&str>) -> Result<Box<dyn ToolCaller>> {
        let client = McpClient::connect(self.config.clone(), resume_session).await?;
        Ok(Box::new(client))
    }
}
