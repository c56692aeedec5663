//! CLI command handlers.

pub mod chat;
pub mod config;
pub mod fetch;
pub mod input;
pub mod resume;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use console::Style;

use folio_config::{AuthMode, FolioConfig, LoadedConfig};
use folio_mcp::{HttpConnector, McpServerConfig};
use folio_portfolio::{
    CancellationToken, FetchPlan, Handshake, HandshakeConfig, HandshakeMode, LoginPrompter,
    PortfolioFetcher, PortfolioRecord, PortfolioResource, ResourceSlot, SessionMarkerStore,
    summarize, summarize_record,
};

/// Session key used when `--session` is not given.
pub const DEFAULT_SESSION: &str = "default";

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration, with CLI overrides applied.
    pub config: FolioConfig,
    /// Where the configuration came from.
    pub loaded: LoadedConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Apply CLI overrides to the loaded config and validate the result.
    pub fn new(
        loaded: LoadedConfig,
        server: Option<String>,
        json_output: bool,
        verbose: bool,
    ) -> Result<Self> {
        let mut config = loaded.config.clone();
        if let Some(url) = server {
            let mut server = config.server();
            server.url = url;
            config.server = Some(server);
        }
        config.validate().context("invalid configuration")?;

        Ok(Self {
            config,
            loaded,
            json_output,
            verbose,
        })
    }

    /// Build a fetcher from the configuration.
    ///
    /// `deferred` forces deferred login regardless of `[auth] mode`.
    /// Interactive logins are confirmed through `prompter`.
    pub fn fetcher(
        &self,
        deferred: bool,
        prompter: Arc<dyn LoginPrompter>,
    ) -> Result<PortfolioFetcher> {
        let server = self.config.server();
        let auth = self.config.auth();
        let portfolio = self.config.portfolio();

        let mut mcp = McpServerConfig::new("portfolio", server.url.clone())
            .with_timeout(server.timeout());
        for (key, value) in &server.headers {
            mcp = mcp.with_header(key.clone(), value.clone());
        }

        let mode = if deferred || auth.mode == AuthMode::Deferred {
            HandshakeMode::Deferred
        } else {
            HandshakeMode::Interactive {
                timeout: auth.confirmation_timeout(),
            }
        };
        let handshake = Handshake::new(
            HandshakeConfig {
                mode,
                max_retries: auth.max_retries,
                open_browser: auth.open_browser,
            },
            SessionMarkerStore::new(auth.marker_dir()),
        )
        .with_prompter(prompter);

        let plan = FetchPlan {
            probe: portfolio
                .probe
                .parse::<PortfolioResource>()
                .with_context(|| format!("invalid probe resource '{}'", portfolio.probe))?,
            resources: portfolio
                .resources
                .iter()
                .map(|name| name.parse::<PortfolioResource>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("invalid resource list")?,
            namespace: portfolio.namespace.clone(),
        };

        tracing::debug!(url = %server.url, ?mode, "building portfolio fetcher");
        Ok(PortfolioFetcher::new(Arc::new(HttpConnector::new(mcp)), handshake).with_plan(plan))
    }

    /// Print a fetched record, as JSON or as summary lines.
    pub fn print_record(&self, record: &PortfolioRecord, resource: Option<PortfolioResource>) {
        if self.json_output {
            let value = match resource {
                Some(resource) => record.resource_json(resource),
                None => record.to_json(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            );
            return;
        }

        match resource {
            Some(resource) => {
                let label = resource.label();
                let line = match record.get(resource) {
                    Some(ResourceSlot::Fetched(response)) => summarize(resource, response)
                        .or_else(|| response.as_json().map(|v| format!("{label}: {v}")))
                        .unwrap_or_else(|| format!("{label}: fetched")),
                    Some(ResourceSlot::Failed(e)) => format!("{label}: unavailable ({})", e.kind()),
                    None => format!("{label}: not requested"),
                };
                println!("{line}");
            }
            None => {
                for line in summarize_record(record) {
                    println!("{line}");
                }
            }
        }

        if self.verbose {
            let dim = Style::new().dim();
            println!(
                "{}",
                dim.apply_to(format!("Fetched at {}", record.fetched_at().to_rfc3339()))
            );
        }
    }
}

/// A token that is cancelled on Ctrl+C.
pub fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            child.cancel();
        }
    });
    token
}
