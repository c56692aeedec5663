//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [server]                 # MCP endpoint
//! [auth]                   # login handshake behaviour
//! [portfolio]              # resources to fetch
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Names of every portfolio resource, in record order.
pub const KNOWN_RESOURCES: &[&str] = &[
    "net_worth",
    "credit_report",
    "epf_details",
    "mutual_fund_transactions",
    "stock_transactions",
    "bank_transactions",
];

/// Default MCP endpoint.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080/mcp/stream";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default time to wait for the human to finish logging in.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 600;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged. Use the accessor methods to read a
/// section with defaults filled in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    /// MCP server settings.
    pub server: Option<ServerConfig>,

    /// Login handshake settings.
    pub auth: Option<AuthConfig>,

    /// Portfolio resource selection.
    pub portfolio: Option<PortfolioConfig>,
}

impl FolioConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: FolioConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }

        if other.auth.is_some() {
            self.auth = other.auth;
        }

        if other.portfolio.is_some() {
            self.portfolio = other.portfolio;
        }
    }

    /// The `[server]` section, or defaults.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// The `[auth]` section, or defaults.
    pub fn auth(&self) -> AuthConfig {
        self.auth.clone().unwrap_or_default()
    }

    /// The `[portfolio]` section, or defaults.
    pub fn portfolio(&self) -> PortfolioConfig {
        self.portfolio.clone().unwrap_or_default()
    }

    /// Check values that parse but cannot be used.
    pub fn validate(&self) -> crate::Result<()> {
        let server = self.server();
        if server.url.trim().is_empty() {
            return Err(ConfigError::invalid("server.url", "must not be empty"));
        }
        if server.timeout_secs == 0 {
            return Err(ConfigError::invalid("server.timeout_secs", "must be at least 1"));
        }

        let auth = self.auth();
        if auth.max_retries == 0 {
            return Err(ConfigError::invalid("auth.max_retries", "must be at least 1"));
        }

        let portfolio = self.portfolio();
        if portfolio.resources.is_empty() {
            return Err(ConfigError::invalid(
                "portfolio.resources",
                "at least one resource is required",
            ));
        }
        for name in &portfolio.resources {
            check_resource(name, "portfolio.resources")?;
        }
        check_resource(&portfolio.probe, "portfolio.probe")?;

        Ok(())
    }
}

fn check_resource(name: &str, field: &str) -> crate::Result<()> {
    if KNOWN_RESOURCES.contains(&name) {
        Ok(())
    } else {
        Err(ConfigError::UnknownResource {
            name: name.to_string(),
            field: field.to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// MCP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Streamable HTTP endpoint.
    pub url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Extra HTTP headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl ServerConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            headers: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// How the handshake waits for the human to finish logging in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Suspend in-process until the human confirms.
    #[default]
    Interactive,
    /// Record the pending session and return; a later run resumes it.
    Deferred,
}

/// Login handshake configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Confirmation mechanism.
    pub mode: AuthMode,
    /// Probe retries after confirmation before giving up.
    pub max_retries: u32,
    /// Seconds to wait for confirmation; `None` waits indefinitely.
    pub confirmation_timeout_secs: Option<u64>,
    /// Try to open the login URL in a browser.
    pub open_browser: bool,
    /// Directory for pending-session markers; defaults to the temp dir.
    pub marker_dir: Option<PathBuf>,
}

impl AuthConfig {
    /// Confirmation timeout as a [`Duration`].
    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout_secs.map(Duration::from_secs)
    }

    /// Marker directory with the temp dir filled in.
    pub fn marker_dir(&self) -> PathBuf {
        self.marker_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Interactive,
            max_retries: 1,
            confirmation_timeout_secs: Some(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            open_browser: true,
            marker_dir: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Portfolio Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Portfolio resource selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    /// Service prefix applied to tool names (`networth:fetch_net_worth`).
    pub namespace: Option<String>,
    /// Resource fetched first to detect whether login is needed.
    pub probe: String,
    /// Resources fetched into the record.
    pub resources: Vec<String>,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            probe: "net_worth".to_string(),
            resources: KNOWN_RESOURCES.iter().map(|r| r.to_string()).collect(),
        }
    }
}
