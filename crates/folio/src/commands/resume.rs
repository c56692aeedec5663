//! Resume command - continue a deferred login.

use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Args;

use folio_portfolio::{PortfolioResource, TerminalPrompter};

use super::fetch::report;
use super::{Context, DEFAULT_SESSION, ctrl_c_token};

/// Arguments for the resume command.
#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Session key the login was started under
    #[arg(short, long, default_value = DEFAULT_SESSION)]
    pub session: String,

    /// Print only this resource
    #[arg(short, long)]
    pub resource: Option<PortfolioResource>,
}

/// Run the resume command.
pub async fn run(args: ResumeArgs, ctx: &Context) -> Result<()> {
    // Stays deferred: if the login still isn't done the marker is kept.
    let fetcher = ctx.fetcher(true, Arc::new(TerminalPrompter::default()))?;

    let pending = fetcher
        .handshake()
        .markers()
        .read(&args.session)
        .await
        .map_err(|e| report(e, &args.session))?;
    let Some(remote) = pending else {
        bail!(
            "no pending login for session '{}'; run `folio fetch --session {}` first",
            args.session,
            args.session
        );
    };
    tracing::info!(session = %args.session, remote_session = %remote, "resuming login");

    let cancel = ctrl_c_token();
    let record = fetcher
        .get_portfolio(&args.session, &cancel)
        .await
        .map_err(|e| report(e, &args.session))?;
    ctx.print_record(&record, args.resource);
    Ok(())
}
