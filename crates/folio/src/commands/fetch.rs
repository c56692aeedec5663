//! Fetch command - run the full flow once and print the record.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::Style;

use folio_portfolio::{PortfolioError, PortfolioResource, TerminalPrompter};

use super::{Context, DEFAULT_SESSION, ctrl_c_token};

/// Arguments for the fetch command.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Session key; a deferred login is resumed under the same key
    #[arg(short, long, default_value = DEFAULT_SESSION)]
    pub session: String,

    /// Print only this resource (e.g. "net worth", "funds", "epf")
    #[arg(short, long)]
    pub resource: Option<PortfolioResource>,

    /// Don't wait for login; print the login URL and exit
    #[arg(long)]
    pub deferred: bool,
}

/// Run the fetch command.
pub async fn run(args: FetchArgs, ctx: &Context) -> Result<()> {
    let fetcher = ctx.fetcher(args.deferred, Arc::new(TerminalPrompter::default()))?;

    if ctx.verbose {
        let dim = Style::new().dim();
        eprintln!(
            "{}",
            dim.apply_to(format!("Fetching from: {}", ctx.config.server().url))
        );
        eprintln!("{}", dim.apply_to(format!("Session: {}", args.session)));
    }

    let cancel = ctrl_c_token();
    match fetcher.get_portfolio(&args.session, &cancel).await {
        Ok(record) => {
            ctx.print_record(&record, args.resource);
            Ok(())
        }
        Err(e) => Err(report(e, &args.session)),
    }
}

/// Print a portfolio error for the human and turn it into the exit error.
pub(crate) fn report(err: PortfolioError, session: &str) -> anyhow::Error {
    tracing::debug!(error = ?err, "fetch failed");
    let red = Style::new().red();
    eprintln!("{} {}", red.apply_to("Error:"), err.user_message());

    if let PortfolioError::LoginRequired {
        resumable: true, ..
    } = &err
    {
        let dim = Style::new().dim();
        eprintln!(
            "{}",
            dim.apply_to(format!(
                "After logging in, run: folio resume --session {session}"
            ))
        );
    }
    anyhow::Error::new(err)
}
