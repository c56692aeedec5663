//! Error types for the portfolio crate.

use std::path::PathBuf;

use folio_mcp::McpError;
use thiserror::Error;

use crate::resource::PortfolioResource;

/// Result type alias using the portfolio error type.
pub type Result<T> = std::result::Result<T, PortfolioError>;

/// Error type for portfolio fetches.
#[derive(Debug, Error)]
pub enum PortfolioError {
    /// The RPC layer failed (connect, probe, or transport fault).
    #[error("transport error calling '{tool}' (session {session}): {source}")]
    Transport {
        tool: String,
        session: String,
        #[source]
        source: McpError,
    },

    /// The probe tool answered with `isError`.
    #[error("tool '{tool}' reported an error (session {session}): {message}")]
    ToolFailed {
        tool: String,
        session: String,
        message: String,
    },

    /// The human never completed the login, declined, or retries ran out.
    #[error("authorization not completed for session {session} after {attempts} probe(s)")]
    AuthorizationTimeout { session: String, attempts: u32 },

    /// Deferred mode is waiting for the human to log in.
    ///
    /// `resumable` is set when the pending remote session was recorded, so
    /// a later run can pick it up.
    #[error("login required for session {session}: {login_url}")]
    LoginRequired {
        session: String,
        login_url: String,
        resumable: bool,
    },

    /// Every resource in the batch failed.
    #[error("all {} resources failed for session {session}", failures.len())]
    FetchAllFailed {
        session: String,
        failures: Vec<(PortfolioResource, ResourceFetchError)>,
    },

    /// The conversation was aborted.
    #[error("cancelled (session {session})")]
    Cancelled { session: String },

    /// Reading or writing a session marker failed.
    #[error("session marker '{}': {source}", path.display())]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PortfolioError {
    /// Create a transport error.
    pub fn transport(tool: impl Into<String>, session: &str, source: McpError) -> Self {
        Self::Transport {
            tool: tool.into(),
            session: session.to_string(),
            source,
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(session: &str) -> Self {
        Self::Cancelled {
            session: session.to_string(),
        }
    }

    /// The session key the error belongs to, when there is one.
    pub fn session(&self) -> Option<&str> {
        match self {
            Self::Transport { session, .. }
            | Self::ToolFailed { session, .. }
            | Self::AuthorizationTimeout { session, .. }
            | Self::LoginRequired { session, .. }
            | Self::FetchAllFailed { session, .. }
            | Self::Cancelled { session } => Some(session),
            Self::Marker { .. } => None,
        }
    }

    /// Text suitable for showing to the person on the other end.
    ///
    /// Never includes protocol details or internal error chains.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { .. } => {
                "The portfolio service could not be reached. Please try again in a moment."
                    .to_string()
            }
            Self::ToolFailed { message, .. } => {
                format!("The portfolio service could not complete the request: {message}")
            }
            Self::AuthorizationTimeout { .. } => {
                "Login was not completed, so no portfolio data was fetched. Ask again once you have logged in."
                    .to_string()
            }
            Self::LoginRequired { login_url, .. } => format!(
                "Please log in to your account at {login_url} and then ask again."
            ),
            Self::FetchAllFailed { .. } => {
                "None of your portfolio data could be fetched right now. Please try again later."
                    .to_string()
            }
            Self::Cancelled { .. } => "The request was cancelled.".to_string(),
            Self::Marker { .. } => {
                "The pending login could not be recorded locally. Please try again.".to_string()
            }
        }
    }
}

/// Why a single resource is missing from a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceFetchError {
    /// The call failed in transit.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The tool answered with `isError`.
    #[error("tool reported an error: {message}")]
    ToolFailed { message: String },

    /// The service asked for login again in the middle of the batch.
    #[error("authorization lost mid-batch (login requested at {login_url})")]
    AuthorizationLost { login_url: String },
}

impl ResourceFetchError {
    /// Short machine-readable reason.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::ToolFailed { .. } => "tool_failed",
            Self::AuthorizationLost { .. } => "authorization_lost",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_protocol_detail() {
        let err = PortfolioError::transport(
            "fetch_net_worth",
            "conv-1",
            McpError::HttpStatus {
                status: 502,
                body: "<html>bad gateway</html>".to_string(),
            },
        );
        let msg = err.user_message();
        assert!(!msg.contains("502"));
        assert!(!msg.contains("html"));
        assert!(err.to_string().contains("fetch_net_worth"));
    }

    #[test]
    fn test_login_required_message_carries_url() {
        let err = PortfolioError::LoginRequired {
            session: "conv-1".to_string(),
            login_url: "http://localhost:8080/mockWebPage?sessionId=abc123".to_string(),
            resumable: true,
        };
        assert!(err.user_message().contains("sessionId=abc123"));
        assert_eq!(err.session(), Some("conv-1"));
    }

    #[test]
    fn test_fetch_all_failed_display() {
        let err = PortfolioError::FetchAllFailed {
            session: "conv-1".to_string(),
            failures: vec![(
                PortfolioResource::NetWorth,
                ResourceFetchError::Transport {
                    message: "refused".to_string(),
                },
            )],
        };
        assert_eq!(err.to_string(), "all 1 resources failed for session conv-1");
    }

    #[test]
    fn test_resource_error_kind() {
        let err = ResourceFetchError::AuthorizationLost {
            login_url: "u".to_string(),
        };
        assert_eq!(err.kind(), "authorization_lost");
    }
}
