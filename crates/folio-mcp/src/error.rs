//! Error types for MCP operations.

use thiserror::Error;

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to communicate with the MCP server.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success HTTP status.
    #[error("HTTP error {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly empty).
        body: String,
    },

    /// JSON-RPC protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("server error {code}: {message}")]
    ServerError {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
        /// Optional additional data.
        data: Option<serde_json::Value>,
    },

    /// Tool name was empty or malformed.
    #[error("invalid tool name: {0:?}")]
    InvalidToolName(String),

    /// A tool call failed; carries the tool name and the underlying cause.
    #[error("call to tool '{tool}' failed: {source}")]
    ToolCall {
        /// Tool name as given by the caller (before prefix stripping).
        tool: String,
        /// Underlying cause.
        #[source]
        source: Box<McpError>,
    },

    /// Server not initialized.
    #[error("server not initialized - call initialize() first")]
    NotInitialized,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Timeout waiting for response.
    #[error("timeout waiting for response")]
    Timeout,
}

impl McpError {
    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a server error from an error response.
    pub fn server_error(
        code: i64,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
            data,
        }
    }

    /// Wrap an error with the name of the tool whose call produced it.
    pub fn tool_call(tool: impl Into<String>, source: McpError) -> Self {
        Self::ToolCall {
            tool: tool.into(),
            source: Box::new(source),
        }
    }

    /// Tool name attached to this error, if any.
    pub fn tool(&self) -> Option<&str> {
        match self {
            Self::ToolCall { tool, .. } => Some(tool),
            _ => None,
        }
    }

    /// Innermost cause, with tool-call wrapping removed.
    pub fn root(&self) -> &McpError {
        match self {
            Self::ToolCall { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for McpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}
