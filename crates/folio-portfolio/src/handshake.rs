//! Login handshake with out-of-band human completion.
//!
//! The service answers the probe call with an authorization-pending payload
//! until the human has logged in through a browser. The handshake walks:
//!
//! ```text
//! Start → Probing ─┬─→ Authorized
//!                  └─→ PendingExternal ──confirm──→ Retrying ─┬─→ Authorized
//!                                                             ├─→ PendingExternal
//!                                                             └─→ Exhausted
//! ```
//!
//! In [`HandshakeMode::Interactive`] the task suspends on a [`LoginPrompter`]
//! until the human confirms. In [`HandshakeMode::Deferred`] the pending
//! remote session is written to a [`SessionMarkerStore`] and the caller gets
//! [`PortfolioError::LoginRequired`]; the next run reconnects to that session.
//! The service is never polled while waiting.

use std::io::{BufRead, Write as _};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use folio_mcp::ToolCaller;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::decode::{ToolResponse, decode};
use crate::error::{PortfolioError, Result};
use crate::marker::SessionMarkerStore;

/// Query parameter of the login URL naming the remote session.
pub const LOGIN_SESSION_PARAM: &str = "sessionId";

/// Phases of the handshake, recorded in order for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Start,
    Probing,
    PendingExternal,
    Retrying,
    Authorized,
    Exhausted,
}

impl HandshakePhase {
    fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Probing => "probing",
            Self::PendingExternal => "pending_external",
            Self::Retrying => "retrying",
            Self::Authorized => "authorized",
            Self::Exhausted => "exhausted",
        }
    }
}

/// How the handshake waits for the human.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    /// Suspend until the prompter confirms, optionally bounded.
    Interactive { timeout: Option<Duration> },
    /// Record the pending session and return `LoginRequired`.
    Deferred,
}

impl Default for HandshakeMode {
    fn default() -> Self {
        Self::Interactive { timeout: None }
    }
}

/// Handshake settings.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub mode: HandshakeMode,
    /// Probe retries after confirmation. Values below 1 are raised to 1.
    pub max_retries: u32,
    pub open_browser: bool,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            mode: HandshakeMode::default(),
            max_retries: 1,
            open_browser: true,
        }
    }
}

/// What the human is asked to do.
#[derive(Debug, Clone)]
pub struct LoginPrompt {
    pub session_key: String,
    pub login_url: String,
    pub message: Option<String>,
    /// 1 for the first request, 2 after a failed retry, ...
    pub attempt: u32,
}

/// Presents a login request and waits for the human.
#[async_trait]
pub trait LoginPrompter: Send + Sync {
    /// Resolve to `true` once the human says the login is done, `false`
    /// if they decline.
    async fn confirm_login(&self, prompt: &LoginPrompt) -> bool;
}

/// Whether a typed confirmation answer declines the login.
pub fn declines_login(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "n" | "no" | "q")
}

/// Source of the confirmation line, opened once per prompt.
pub type PromptInput = Arc<dyn Fn() -> Box<dyn BufRead + Send> + Send + Sync>;

/// Prompts on the terminal and waits for Enter.
///
/// Typing `n`, `no` or `q`, or closing stdin, declines. The line is read on
/// a detached thread, so a prompt abandoned on cancellation never holds up
/// runtime shutdown.
#[derive(Clone)]
pub struct TerminalPrompter {
    input: PromptInput,
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::with_input(Arc::new(|| {
            Box::new(std::io::BufReader::new(std::io::stdin())) as Box<dyn BufRead + Send>
        }))
    }
}

impl std::fmt::Debug for TerminalPrompter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalPrompter").finish_non_exhaustive()
    }
}

impl TerminalPrompter {
    /// Read confirmations from `input` instead of stdin.
    pub fn with_input(input: PromptInput) -> Self {
        Self { input }
    }
}

#[async_trait]
impl LoginPrompter for TerminalPrompter {
    async fn confirm_login(&self, prompt: &LoginPrompt) -> bool {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr);
        if let Some(message) = &prompt.message {
            let _ = writeln!(stderr, "{message}");
        }
        let _ = writeln!(stderr, "Log in at: {}", prompt.login_url);
        let _ = write!(
            stderr,
            "Press Enter once you have completed the login (or 'n' to cancel)... "
        );
        let _ = stderr.flush();

        let (tx, rx) = oneshot::channel();
        let input = Arc::clone(&self.input);
        let spawned = std::thread::Builder::new()
            .name("folio-login-prompt".to_string())
            .spawn(move || {
                let mut reader = input();
                let mut line = String::new();
                let _ = tx.send(reader.read_line(&mut line).map(|n| (n, line)));
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "could not start login confirmation reader");
            return false;
        }

        match rx.await {
            Ok(Ok((0, _))) => false,
            Ok(Ok((_, input))) => !declines_login(&input),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to read login confirmation");
                false
            }
            Err(_) => {
                tracing::warn!("login confirmation reader stopped");
                false
            }
        }
    }
}

/// Opens URLs for the human.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Opens URLs with the platform's default handler.
#[derive(Debug, Default, Clone)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        #[cfg(target_os = "macos")]
        {
            run_opener(Command::new("open").arg(url))?;
        }
        #[cfg(target_os = "linux")]
        {
            run_opener(Command::new("xdg-open").arg(url))?;
        }
        #[cfg(target_os = "windows")]
        {
            run_opener(Command::new("cmd").args(["/C", "start", url]))?;
        }
        Ok(())
    }
}

/// Run a URL opener to completion; a non-zero exit is an error.
fn run_opener(command: &mut Command) -> std::io::Result<()> {
    let status = command.status()?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("opener exited with {status}")))
    }
}

/// Never opens anything.
#[derive(Debug, Default, Clone)]
pub struct NoBrowser;

impl BrowserLauncher for NoBrowser {
    fn open(&self, _url: &str) -> std::io::Result<()> {
        Ok(())
    }
}

/// The remote session id carried by a login URL.
pub fn extract_session_id(login_url: &str) -> Option<String> {
    let url = Url::parse(login_url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == LOGIN_SESSION_PARAM)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Successful handshake.
#[derive(Debug, Clone)]
pub struct Authorized {
    /// The probe's decoded response.
    pub probe: ToolResponse,
    /// Probe calls made, including the first.
    pub probes: u32,
    /// Remote session named by the last login URL, if any was seen.
    pub remote_session: Option<String>,
    /// Phases visited, in order.
    pub phases: Vec<HandshakePhase>,
}

/// Runs the login handshake over an open connection.
#[derive(Clone)]
pub struct Handshake {
    config: HandshakeConfig,
    prompter: Arc<dyn LoginPrompter>,
    browser: Arc<dyn BrowserLauncher>,
    markers: SessionMarkerStore,
}

impl Handshake {
    /// Create a handshake using the terminal and the system browser.
    pub fn new(config: HandshakeConfig, markers: SessionMarkerStore) -> Self {
        Self {
            config,
            prompter: Arc::new(TerminalPrompter::default()),
            browser: Arc::new(SystemBrowser),
            markers,
        }
    }

    /// Use a different prompter.
    pub fn with_prompter(mut self, prompter: Arc<dyn LoginPrompter>) -> Self {
        self.prompter = prompter;
        self
    }

    /// Use a different browser launcher.
    pub fn with_browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    pub fn markers(&self) -> &SessionMarkerStore {
        &self.markers
    }

    /// Probe until authorized.
    ///
    /// `probe_tool` is called with no arguments. Errors:
    /// - `Transport` / `ToolFailed` when the probe itself fails;
    /// - `LoginRequired` in deferred mode while the human has not logged in;
    /// - `AuthorizationTimeout` when the human declines, the confirmation
    ///   times out, or retries run out;
    /// - `Cancelled` when `cancel` fires.
    pub async fn run(
        &self,
        caller: &dyn ToolCaller,
        session: &str,
        probe_tool: &str,
        cancel: &CancellationToken,
    ) -> Result<Authorized> {
        let max_retries = self.config.max_retries.max(1);
        let mut phases = vec![HandshakePhase::Start];
        let mut probes = 0u32;
        let mut remote_session = None;
        let mut phase = HandshakePhase::Probing;

        loop {
            self.enter(&mut phases, phase, session, probes);

            let response = self.probe(caller, session, probe_tool, cancel).await?;
            probes += 1;

            let (login_url, message) = match response {
                ToolResponse::AuthorizationPending { login_url, message } => (login_url, message),
                probe => {
                    self.enter(&mut phases, HandshakePhase::Authorized, session, probes);
                    return Ok(Authorized {
                        probe,
                        probes,
                        remote_session,
                        phases,
                    });
                }
            };

            // probes - 1 retries have been spent at this point.
            if probes > max_retries {
                self.enter(&mut phases, HandshakePhase::Exhausted, session, probes);
                return Err(PortfolioError::AuthorizationTimeout {
                    session: session.to_string(),
                    attempts: probes,
                });
            }

            self.enter(&mut phases, HandshakePhase::PendingExternal, session, probes);
            remote_session = extract_session_id(&login_url).or(remote_session);
            self.open_browser(&login_url);

            match self.config.mode {
                HandshakeMode::Deferred => {
                    let resumable = match &remote_session {
                        Some(remote) => {
                            self.markers.write(session, remote).await?;
                            true
                        }
                        None => false,
                    };
                    tracing::info!(session = %session, resumable, "login deferred to a later run");
                    return Err(PortfolioError::LoginRequired {
                        session: session.to_string(),
                        login_url,
                        resumable,
                    });
                }
                HandshakeMode::Interactive { timeout } => {
                    let prompt = LoginPrompt {
                        session_key: session.to_string(),
                        login_url,
                        message,
                        attempt: probes,
                    };
                    if !self.wait_for_confirmation(&prompt, timeout, cancel).await? {
                        self.enter(&mut phases, HandshakePhase::Exhausted, session, probes);
                        return Err(PortfolioError::AuthorizationTimeout {
                            session: session.to_string(),
                            attempts: probes,
                        });
                    }
                }
            }

            phase = HandshakePhase::Retrying;
        }
    }

    fn enter(
        &self,
        phases: &mut Vec<HandshakePhase>,
        next: HandshakePhase,
        session: &str,
        probes: u32,
    ) {
        tracing::debug!(
            session = %session,
            state = next.as_str(),
            attempt = probes,
            "handshake state"
        );
        phases.push(next);
    }

    async fn probe(
        &self,
        caller: &dyn ToolCaller,
        session: &str,
        probe_tool: &str,
        cancel: &CancellationToken,
    ) -> Result<ToolResponse> {
        let result = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(PortfolioError::cancelled(session)),
            result = caller.call_tool(probe_tool, None) => result,
        }
        .map_err(|e| PortfolioError::transport(probe_tool, session, e))?;

        if result.is_error() {
            return Err(PortfolioError::ToolFailed {
                tool: probe_tool.to_string(),
                session: session.to_string(),
                message: result
                    .text()
                    .unwrap_or_else(|| "tool reported an error".to_string()),
            });
        }
        Ok(decode(&result))
    }

    fn open_browser(&self, login_url: &str) {
        if !self.config.open_browser {
            return;
        }
        if let Err(e) = self.browser.open(login_url) {
            tracing::warn!(error = %e, "could not open browser for login");
        }
    }

    /// `Ok(true)` when confirmed; `Ok(false)` when declined or timed out.
    async fn wait_for_confirmation(
        &self,
        prompt: &LoginPrompt,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let confirm = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, self.prompter.confirm_login(prompt))
                    .await
                    .unwrap_or_else(|_| {
                        tracing::warn!(session = %prompt.session_key, "login confirmation timed out");
                        false
                    }),
                None => self.prompter.confirm_login(prompt).await,
            }
        };

        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(PortfolioError::cancelled(&prompt.session_key)),
            confirmed = confirm => Ok(confirmed),
        }
    }
}
