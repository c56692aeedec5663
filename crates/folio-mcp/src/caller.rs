//! Seams between the MCP client and the code that drives it.
//!
//! [`ToolCaller`] is one open connection that can invoke tools;
//! [`Connector`] opens a fresh one, optionally reattaching to a remote
//! session whose login was completed out of band.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::protocol::CallToolResult;

/// An open connection able to invoke remote tools.
///
/// Implementations must tolerate concurrent `call_tool` invocations.
#[async_trait]
pub trait ToolCaller: Send + Sync {
    /// Invoke a tool. `name` may carry a `service:` prefix.
    async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult>;

    /// Server-assigned session id, if the transport has one.
    fn session_id(&self) -> Option<String> {
        None
    }

    /// Release the connection. Idempotent.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Opens connections to a tool server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and initialize. `resume_session` reattaches to a remote
    /// session created by an earlier connection.
    async fn connect(&self, resume_session: Option<&str>) -> Result<Box<dyn ToolCaller>>;
}
