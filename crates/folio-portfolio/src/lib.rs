//! Login-gated portfolio fetch over MCP.
//!
//! A conversation asks for the user's portfolio; the first request connects
//! to the data service, walks the human through an out-of-band browser login
//! if needed, fetches every resource concurrently and caches the aggregated
//! record under the conversation's key. Later requests answer from the cache.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use folio_mcp::{HttpConnector, McpServerConfig};
//! use folio_portfolio::{Handshake, HandshakeConfig, PortfolioFetcher, SessionMarkerStore};
//!
//! let connector = HttpConnector::new(McpServerConfig::new("fi", "http://localhost:8080/mcp/stream"));
//! let handshake = Handshake::new(HandshakeConfig::default(), SessionMarkerStore::in_temp_dir());
//! let fetcher = PortfolioFetcher::new(Arc::new(connector), handshake);
//!
//! let record = fetcher.get_portfolio("conversation-1", &CancellationToken::new()).await?;
//! println!("{}", record.to_pretty_json());
//! ```

pub mod decode;
pub mod error;
pub mod fetcher;
pub mod handshake;
pub mod marker;
pub mod record;
pub mod resource;
pub mod summary;
pub mod tool;

pub use decode::{LOGIN_REQUIRED_STATUS, ToolResponse, decode};
pub use error::{PortfolioError, ResourceFetchError, Result};
pub use fetcher::{FetchPlan, PortfolioFetcher};
pub use handshake::{
    Authorized, BrowserLauncher, Handshake, HandshakeConfig, HandshakeMode, HandshakePhase,
    LoginPrompt, LoginPrompter, NoBrowser, PromptInput, SystemBrowser, TerminalPrompter,
    declines_login, extract_session_id,
};
pub use marker::SessionMarkerStore;
pub use record::{PortfolioRecord, ResourceSlot};
pub use resource::{ParseResourceError, PortfolioResource};
pub use summary::{summarize, summarize_record};
pub use tool::{GetPortfolioTool, Tool, ToolContext, ToolResult};

pub use tokio_util::sync::CancellationToken;
