//! Line input for the chat command.
//!
//! The rustyline editor lives on its own thread and serves one line per
//! request. Chat questions and login confirmations both read through it, so
//! only one reader ever owns the terminal.

use std::sync::mpsc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use console::Style;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tokio::sync::oneshot;

use folio_portfolio::{LoginPrompt, LoginPrompter, declines_login};

type LineResult = std::result::Result<String, ReadlineError>;

struct LineRequest {
    prompt: String,
    reply: oneshot::Sender<LineResult>,
}

/// Handle to the editor thread.
pub struct LineEditor {
    requests: mpsc::Sender<LineRequest>,
}

impl LineEditor {
    /// Start the editor thread.
    pub fn spawn() -> Result<Self> {
        let (requests, rx) = mpsc::channel::<LineRequest>();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        std::thread::Builder::new()
            .name("folio-line-editor".to_string())
            .spawn(move || {
                let config = Config::builder()
                    .history_ignore_space(true)
                    .auto_add_history(true)
                    .build();
                let mut editor = match Editor::<(), DefaultHistory>::with_config(config) {
                    Ok(editor) => {
                        let _ = ready_tx.send(Ok(()));
                        editor
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                serve(|prompt| editor.readline(prompt), rx);
            })
            .context("failed to start line editor")?;

        ready_rx
            .recv()
            .context("line editor exited during startup")??;
        Ok(Self { requests })
    }

    /// Read one line. The editor thread keeps running if this future is
    /// dropped; a line typed into an abandoned prompt goes to the next read.
    pub async fn readline(&self, prompt: &str) -> LineResult {
        let (reply, rx) = oneshot::channel();
        let request = LineRequest {
            prompt: prompt.to_string(),
            reply,
        };
        if self.requests.send(request).is_err() {
            return Err(ReadlineError::Eof);
        }
        rx.await.unwrap_or(Err(ReadlineError::Eof))
    }
}

fn serve(mut read: impl FnMut(&str) -> LineResult, requests: mpsc::Receiver<LineRequest>) {
    let mut unclaimed: Option<LineResult> = None;
    while let Ok(request) = requests.recv() {
        let line = match unclaimed.take() {
            Some(line) => line,
            None => read(&request.prompt),
        };
        if let Err(line) = request.reply.send(line) {
            unclaimed = Some(line);
        }
    }
}

/// Confirms logins through the chat's line editor.
pub struct ChatPrompter {
    editor: std::sync::Arc<LineEditor>,
}

impl ChatPrompter {
    pub fn new(editor: std::sync::Arc<LineEditor>) -> Self {
        Self { editor }
    }
}

#[async_trait]
impl LoginPrompter for ChatPrompter {
    async fn confirm_login(&self, prompt: &LoginPrompt) -> bool {
        let dim = Style::new().dim();
        println!();
        if let Some(message) = &prompt.message {
            println!("{}", dim.apply_to(message));
        }
        println!("Log in at: {}", prompt.login_url);

        match self
            .editor
            .readline("Press Enter once you have logged in (or 'n' to cancel): ")
            .await
        {
            Ok(answer) => !declines_login(&answer),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => false,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read login confirmation");
                false
            }
        }
    }
}
