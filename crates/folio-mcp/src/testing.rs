//! Scripted in-memory tool callers for tests.
//!
//! [`MockToolCaller`] answers tool calls from per-tool scripts and records
//! every call; [`MockConnector`] hands out connections backed by one shared
//! caller and tracks how many are open.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::caller::{Connector, ToolCaller};
use crate::client::bare_tool_name;
use crate::error::{McpError, Result};
use crate::protocol::CallToolResult;

#[derive(Debug, Clone)]
enum MockReply {
    Result(CallToolResult),
    TransportFailure(String),
}

#[derive(Default)]
struct MockState {
    scripts: Mutex<HashMap<String, VecDeque<MockReply>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Tool caller answering from scripted replies.
///
/// Replies for a tool are consumed in order; the last one is sticky and
/// answers every later call. Unscripted tools fail with a protocol error.
#[derive(Clone, Default)]
pub struct MockToolCaller {
    state: Arc<MockState>,
}

impl MockToolCaller {
    /// Create a caller with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a caller that sleeps before answering each call.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            state: Arc::new(MockState {
                delay: Some(delay),
                ..Default::default()
            }),
        }
    }

    fn push(&self, tool: &str, reply: MockReply) -> &Self {
        self.state
            .scripts
            .lock()
            .entry(tool.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Script a successful result for `tool` (bare name).
    pub fn reply(&self, tool: &str, result: CallToolResult) -> &Self {
        self.push(tool, MockReply::Result(result))
    }

    /// Script a text result for `tool`.
    pub fn reply_text(&self, tool: &str, text: impl Into<String>) -> &Self {
        self.reply(tool, CallToolResult::text_result(text))
    }

    /// Script a JSON result (serialized as text content) for `tool`.
    pub fn reply_json(&self, tool: &str, value: Value) -> &Self {
        self.reply_text(tool, value.to_string())
    }

    /// Script a transport failure for `tool`.
    pub fn fail(&self, tool: &str, message: impl Into<String>) -> &Self {
        self.push(tool, MockReply::TransportFailure(message.into()))
    }

    /// Bare names of every tool called, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().clone()
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.state.calls.lock().len()
    }

    /// Number of calls made to one tool.
    pub fn calls_to(&self, tool: &str) -> usize {
        self.state.calls.lock().iter().filter(|c| *c == tool).count()
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, tool: &str) -> Option<MockReply> {
        let mut scripts = self.state.scripts.lock();
        let queue = scripts.get_mut(tool)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl ToolCaller for MockToolCaller {
    async fn call_tool(&self, name: &str, _arguments: Option<Value>) -> Result<CallToolResult> {
        let bare = bare_tool_name(name).map_err(|e| McpError::tool_call(name, e))?;
        self.state.calls.lock().push(bare.to_string());

        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.state.delay {
            tokio::time::sleep(delay).await;
        }
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.next_reply(bare) {
            Some(MockReply::Result(result)) => Ok(result),
            Some(MockReply::TransportFailure(message)) => {
                Err(McpError::tool_call(name, McpError::transport(message)))
            }
            None => Err(McpError::tool_call(
                name,
                McpError::protocol(format!("MockToolCaller: no reply scripted for '{bare}'")),
            )),
        }
    }
}

/// Connector whose connections all share one [`MockToolCaller`].
#[derive(Clone, Default)]
pub struct MockConnector {
    caller: MockToolCaller,
    connects: Arc<Mutex<Vec<Option<String>>>>,
    open: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    refuse: Arc<Mutex<Option<String>>>,
}

impl MockConnector {
    /// Create a connector backed by `caller`.
    pub fn new(caller: MockToolCaller) -> Self {
        Self {
            caller,
            ..Default::default()
        }
    }

    /// Make every later `connect` fail with a transport error.
    pub fn refuse_connections(&self, message: impl Into<String>) {
        *self.refuse.lock() = Some(message.into());
    }

    /// The shared caller.
    pub fn caller(&self) -> &MockToolCaller {
        &self.caller
    }

    /// Resume session passed to each `connect`, in order.
    pub fn connects(&self) -> Vec<Option<String>> {
        self.connects.lock().clone()
    }

    /// Number of connections opened.
    pub fn connect_count(&self) -> usize {
        self.connects.lock().len()
    }

    /// Connections not yet dropped.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Connections released through `close`.
    pub fn closed_connections(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, resume_session: Option<&str>) -> Result<Box<dyn ToolCaller>> {
        if let Some(message) = self.refuse.lock().clone() {
            return Err(McpError::transport(message));
        }
        self.connects.lock().push(resume_session.map(str::to_string));
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            caller: self.caller.clone(),
            open: Arc::clone(&self.open),
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct MockConnection {
    caller: MockToolCaller,
    open: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl ToolCaller for MockConnection {
    async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        self.caller.call_tool(name, arguments).await
    }

    fn session_id(&self) -> Option<String> {
        Some("mock-session".to_string())
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
