//! folio - fetch your financial portfolio over MCP
//!
//! Main entry point for the folio CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{chat, config, fetch, resume};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// folio - fetch your financial portfolio over MCP
#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// MCP endpoint URL (overrides the config file)
    #[arg(long, global = true, env = "FOLIO_SERVER_URL")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the portfolio, logging in first if needed
    Fetch(fetch::FetchArgs),

    /// Resume a deferred login and fetch
    Resume(resume::ResumeArgs),

    /// Ask about parts of the portfolio, one line at a time
    Chat(chat::ChatArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "folio=debug,folio_portfolio=debug,folio_mcp=debug,folio_session=debug,folio_config=debug,info"
    } else {
        "folio=info,folio_portfolio=info,folio_mcp=warn,warn"
    };

    let log_dir = folio_config::config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "folio.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "folio=trace,folio_portfolio=trace,folio_mcp=trace,folio_session=trace,folio_config=trace,info",
                )),
        )
        .init();

    let loaded = folio_config::load_config(None)?;
    for warning in loaded.warnings() {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context::new(loaded, cli.server, cli.json, cli.verbose)?;

    match cli.command {
        Commands::Fetch(args) => fetch::run(args, &ctx).await,
        Commands::Resume(args) => resume::run(args, &ctx).await,
        Commands::Chat(args) => chat::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
