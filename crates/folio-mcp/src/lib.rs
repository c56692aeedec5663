//! MCP (Model Context Protocol) client for folio.
//!
//! Connects to a remote MCP server over the streamable HTTP transport and
//! invokes its tools.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpClient  (ToolCaller)                                    │
//! │  - initialize, tools/call, session release                  │
//! │  - strips `service:` prefixes from tool names               │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  HttpTransport                                              │
//! │  - JSON-RPC 2.0 over HTTP POST                              │
//! │  - JSON or SSE responses, Mcp-Session-Id tracking           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use folio_mcp::{McpClient, McpServerConfig};
//!
//! let config = McpServerConfig::new("fi", "http://localhost:8080/mcp/stream");
//! let client = McpClient::connect(config, None).await?;
//!
//! let result = client.call_tool("networth:fetch_net_worth", None).await?;
//! println!("{:?}", result.text());
//!
//! client.close().await?;
//! ```

pub mod caller;
pub mod client;
pub mod error;
pub mod protocol;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

// Re-export main types
pub use caller::{Connector, ToolCaller};
pub use client::{HttpConnector, McpClient, McpServerConfig, bare_tool_name};
pub use error::{McpError, Result};
pub use protocol::{
    CallToolParams, CallToolResult, EmbeddedResource, Implementation, InitializeParams,
    InitializeResult,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ServerInfo, ToolContent,
};
pub use transport::{HttpTransport, HttpTransportConfig};
