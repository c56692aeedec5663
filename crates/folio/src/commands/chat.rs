//! Chat command - ask about the portfolio one line at a time.
//!
//! Every line is matched against resource names ("net worth", "funds",
//! "credit score", ...). The first question triggers the fetch (and login);
//! later questions in the same session answer from the cached record.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use rustyline::error::ReadlineError;
use serde_json::json;

use folio_portfolio::{
    GetPortfolioTool, PortfolioFetcher, PortfolioResource, Tool, ToolContext, ToolResult,
};

use super::Context;
use super::input::{ChatPrompter, LineEditor};

/// Arguments for the chat command.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Session key (a fresh one is generated if omitted)
    #[arg(short, long)]
    pub session: Option<String>,
}

/// Run the chat command.
pub async fn run(args: ChatArgs, ctx: &Context) -> Result<()> {
    let session = args
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let editor = Arc::new(LineEditor::spawn()?);
    let prompter = Arc::new(ChatPrompter::new(Arc::clone(&editor)));
    let fetcher = Arc::new(ctx.fetcher(false, prompter)?);
    let chat = Chat::new(fetcher, editor, session, ctx.clone());
    chat.run().await
}

struct Chat {
    fetcher: Arc<PortfolioFetcher>,
    tool: GetPortfolioTool,
    session: String,
    editor: Arc<LineEditor>,
    ctx: Context,
}

impl Chat {
    fn new(
        fetcher: Arc<PortfolioFetcher>,
        editor: Arc<LineEditor>,
        session: String,
        ctx: Context,
    ) -> Self {
        Self {
            tool: GetPortfolioTool::new(Arc::clone(&fetcher)),
            fetcher,
            session,
            editor,
            ctx,
        }
    }

    async fn run(&self) -> Result<()> {
        self.print_welcome();

        loop {
            match self.editor.readline("folio> ").await {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if matches!(line, "/quit" | "/exit" | "quit" | "exit") {
                        break;
                    }
                    if line == "/help" {
                        self.print_help();
                        continue;
                    }
                    self.answer(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!();
                    self.print_dim("(Interrupted - type /quit to exit)");
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    async fn answer(&self, line: &str) {
        let Some(resource) = PortfolioResource::find_in(line) else {
            self.print_dim("I can tell you about: net worth, credit report, EPF, mutual funds, stocks, bank transactions.");
            return;
        };
        tracing::debug!(session = %self.session, %resource, "chat question");

        let params = json!({ "resource": resource.key() });
        let ctx = ToolContext::new(self.session.clone());
        let result = tokio::select! {
            result = self.tool.execute(params, &ctx) => result,
            _ = tokio::signal::ctrl_c() => {
                println!();
                self.print_dim("(cancelled)");
                return;
            }
        };

        match result {
            Ok(ToolResult::Text { content }) => {
                if self.ctx.json_output {
                    println!("{content}");
                } else if let Some(record) = self.fetcher.cached(&self.session).await {
                    self.ctx.print_record(&record, Some(resource));
                }
            }
            Ok(ToolResult::Error { message, .. }) => self.print_error(&message),
            Err(e) => self.print_error(&e.user_message()),
        }
    }

    fn print_welcome(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("folio").bold().cyan());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("{}", dim.apply_to(format!("Session: {}", self.session)));
        println!("{}", dim.apply_to("Ask about a part of your portfolio, /help for more"));
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", style("Things to ask about").bold());
        for resource in PortfolioResource::ALL {
            println!("  {}", resource.label());
        }
        println!();
        println!("  /quit    leave the chat");
        println!();
    }

    fn print_dim(&self, msg: &str) {
        let dim = Style::new().dim();
        println!("{}", dim.apply_to(msg));
    }

    fn print_error(&self, msg: &str) {
        let red = Style::new().red();
        println!("{} {}", red.apply_to("Error:"), msg);
    }
}
