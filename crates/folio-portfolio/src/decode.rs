//! Classification of raw tool results.
//!
//! Every [`CallToolResult`] maps to exactly one [`ToolResponse`]. Decoding
//! never fails: anything that is not recognizable JSON is kept verbatim as
//! [`ToolResponse::RawText`].

use folio_mcp::{CallToolResult, ToolContent};
use serde_json::{Value, json};

/// `status` value the service uses to ask for login.
pub const LOGIN_REQUIRED_STATUS: &str = "login_required";

/// A decoded tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResponse {
    /// Parsed JSON payload. An empty result decodes to `{}`.
    StructuredData(Value),
    /// Text that did not parse as JSON, kept as received.
    RawText(String),
    /// The service wants the human to log in first.
    AuthorizationPending {
        login_url: String,
        message: Option<String>,
    },
}

impl ToolResponse {
    /// Check if this is the authorization-pending signal.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::AuthorizationPending { .. })
    }

    /// The structured payload, if any.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::StructuredData(value) => Some(value),
            _ => None,
        }
    }

    /// JSON form used in serialized records.
    pub fn to_json(&self) -> Value {
        match self {
            Self::StructuredData(value) => value.clone(),
            Self::RawText(text) => Value::String(text.clone()),
            Self::AuthorizationPending { login_url, message } => json!({
                "status": LOGIN_REQUIRED_STATUS,
                "login_url": login_url,
                "message": message,
            }),
        }
    }
}

/// Decode a tool result.
///
/// Only the first content item is considered.
pub fn decode(result: &CallToolResult) -> ToolResponse {
    let Some(first) = result.content.first() else {
        return ToolResponse::StructuredData(Value::Object(Default::default()));
    };
    if result.content.len() > 1 {
        tracing::debug!(
            items = result.content.len(),
            "tool result has several content items, using the first"
        );
    }

    match first {
        ToolContent::Text { text } => decode_text(text),
        ToolContent::Resource { resource } => match &resource.text {
            Some(text) => decode_text(text),
            None => raw_item(first),
        },
        ToolContent::Image { .. } => raw_item(first),
    }
}

fn raw_item(item: &ToolContent) -> ToolResponse {
    ToolResponse::RawText(serde_json::to_string(item).unwrap_or_else(|_| format!("{item:?}")))
}

fn decode_text(text: &str) -> ToolResponse {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => classify(value),
        Err(_) => ToolResponse::RawText(text.to_string()),
    }
}

fn classify(value: Value) -> ToolResponse {
    let pending = value.get("status").and_then(Value::as_str) == Some(LOGIN_REQUIRED_STATUS);
    if pending && let Some(login_url) = value.get("login_url").and_then(Value::as_str) {
        return ToolResponse::AuthorizationPending {
            login_url: login_url.to_string(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
        };
    }
    ToolResponse::StructuredData(value)
}
