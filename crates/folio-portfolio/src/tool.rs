//! Agent-facing tool surface.
//!
//! [`GetPortfolioTool`] exposes the fetcher to a conversation front end as a
//! single `get_portfolio` tool. Results are pretty JSON; errors are plain
//! sentences for the human, never protocol detail.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::fetcher::PortfolioFetcher;
use crate::resource::PortfolioResource;

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A capability a conversation front end can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the unique name of this tool.
    fn name(&self) -> &str;

    /// Get a human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// Get the JSON Schema for this tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given parameters.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context provided to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Conversation the call belongs to; keys the result cache.
    pub session_id: String,
    /// Token to check for cancellation.
    pub cancellation: CancellationToken,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Create a context with a cancellation token.
    pub fn with_cancellation(session_id: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            session_id: session_id.into(),
            cancellation,
        }
    }

    /// Check if the call has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    /// Successful text output.
    Text { content: String },
    /// Tool execution failed.
    Error {
        message: String,
        /// Whether asking again can succeed.
        recoverable: bool,
    },
}

impl ToolResult {
    /// Create a text result.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Create a recoverable error result.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            recoverable: true,
        }
    }

    /// Create a non-recoverable error result.
    pub fn fatal_error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            recoverable: false,
        }
    }

    /// Check if this result is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Get the content as a string for the conversation.
    pub fn to_llm_content(&self) -> String {
        match self {
            Self::Text { content } => content.clone(),
            Self::Error { message, .. } => format!("Error: {}", message),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// get_portfolio
// ─────────────────────────────────────────────────────────────────────────────

/// Fetches (once per conversation) and returns the user's portfolio.
pub struct GetPortfolioTool {
    fetcher: Arc<PortfolioFetcher>,
}

impl GetPortfolioTool {
    pub fn new(fetcher: Arc<PortfolioFetcher>) -> Self {
        Self { fetcher }
    }

    fn parse_resource(params: &Value) -> std::result::Result<Option<PortfolioResource>, String> {
        match params.get("resource") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(name)) => name.parse().map(Some).map_err(|_| {
                let known: Vec<&str> = PortfolioResource::ALL.iter().map(|r| r.key()).collect();
                format!(
                    "Unknown resource '{name}'. Choose one of: {}.",
                    known.join(", ")
                )
            }),
            Some(_) => Err("The 'resource' parameter must be a string.".to_string()),
        }
    }
}

#[async_trait]
impl Tool for GetPortfolioTool {
    fn name(&self) -> &str {
        "get_portfolio"
    }

    fn description(&self) -> &str {
        "Fetch the user's financial portfolio: net worth, credit report, EPF details, \
         and mutual fund, stock and bank transactions. The user may be asked to log in \
         the first time. Later calls in the same conversation reuse the fetched data."
    }

    fn parameters(&self) -> Value {
        let keys: Vec<&str> = PortfolioResource::ALL.iter().map(|r| r.key()).collect();
        json!({
            "type": "object",
            "properties": {
                "resource": {
                    "type": "string",
                    "enum": keys,
                    "description": "Return only this part of the portfolio"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolResult> {
        let resource = match Self::parse_resource(&params) {
            Ok(resource) => resource,
            Err(message) => return Ok(ToolResult::fatal_error(message)),
        };

        match self
            .fetcher
            .get_portfolio(&ctx.session_id, &ctx.cancellation)
            .await
        {
            Ok(record) => {
                let value = match resource {
                    Some(resource) => record.resource_json(resource),
                    None => record.to_json(),
                };
                let content =
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
                Ok(ToolResult::text(content))
            }
            Err(e) => {
                tracing::warn!(session = %ctx.session_id, error = %e, "get_portfolio failed");
                Ok(ToolResult::error(e.user_message()))
            }
        }
    }
}
