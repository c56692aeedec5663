//! Cache-fronted, login-gated portfolio fetch.
//!
//! ```text
//! get_portfolio(key)
//!   ├─ cache hit ──────────────────────────────────────────→ record
//!   └─ miss: lock key → connect (resume marker) → handshake
//!            → fan out every resource → assemble → cache → record
//! ```

use std::sync::Arc;

use folio_mcp::{Connector, ToolCaller};
use folio_session::SessionCache;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::decode::{ToolResponse, decode};
use crate::error::{PortfolioError, ResourceFetchError, Result};
use crate::handshake::Handshake;
use crate::record::{PortfolioRecord, ResourceSlot};
use crate::resource::PortfolioResource;

/// Name reported for failures while opening the connection.
const CONNECT_TOOL: &str = "initialize";

/// Which resources to fetch and how to name their tools.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    /// Resource probed to detect whether login is needed.
    pub probe: PortfolioResource,
    /// Resources fetched into the record.
    pub resources: Vec<PortfolioResource>,
    /// Optional `service:` prefix for tool names.
    pub namespace: Option<String>,
}

impl Default for FetchPlan {
    fn default() -> Self {
        Self {
            probe: PortfolioResource::NetWorth,
            resources: PortfolioResource::ALL.to_vec(),
            namespace: None,
        }
    }
}

impl FetchPlan {
    fn tool(&self, resource: PortfolioResource) -> String {
        resource.qualified_tool_name(self.namespace.as_deref())
    }
}

/// Fetches portfolio records, at most one handshake per session key.
pub struct PortfolioFetcher {
    connector: Arc<dyn Connector>,
    handshake: Handshake,
    cache: SessionCache<Arc<PortfolioRecord>>,
    plan: FetchPlan,
}

impl PortfolioFetcher {
    /// Create a fetcher with a fresh cache and the default plan.
    pub fn new(connector: Arc<dyn Connector>, handshake: Handshake) -> Self {
        Self {
            connector,
            handshake,
            cache: SessionCache::new(),
            plan: FetchPlan::default(),
        }
    }

    /// Use a different fetch plan.
    pub fn with_plan(mut self, plan: FetchPlan) -> Self {
        self.plan = plan;
        self
    }

    /// Share an existing cache.
    pub fn with_cache(mut self, cache: SessionCache<Arc<PortfolioRecord>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &SessionCache<Arc<PortfolioRecord>> {
        &self.cache
    }

    pub fn plan(&self) -> &FetchPlan {
        &self.plan
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// The cached record for `session`, without fetching.
    pub async fn cached(&self, session: &str) -> Option<Arc<PortfolioRecord>> {
        self.cache.get(session).await
    }

    /// Return the record for `session`, fetching it on first use.
    ///
    /// Concurrent calls for one session share a single fetch; calls for
    /// different sessions proceed independently. Nothing is cached on
    /// error. The connection is released on every path.
    pub async fn get_portfolio(
        &self,
        session: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<PortfolioRecord>> {
        if let Some(record) = self.cache.get(session).await {
            tracing::debug!(session = %session, "portfolio served from cache");
            return Ok(record);
        }

        let lock = self.cache.key_lock(session);
        let _guard = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(PortfolioError::cancelled(session)),
            guard = lock.lock() => guard,
        };

        // Another caller may have filled the slot while we waited.
        if let Some(record) = self.cache.get(session).await {
            tracing::debug!(session = %session, "portfolio filled by concurrent request");
            return Ok(record);
        }

        let resume = self.handshake.markers().read(session).await?;
        if let Some(remote) = &resume {
            tracing::info!(session = %session, remote = %remote, "resuming pending login");
        }

        let caller = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(PortfolioError::cancelled(session)),
            caller = self.connector.connect(resume.as_deref()) => caller,
        }
        .map_err(|e| PortfolioError::transport(CONNECT_TOOL, session, e))?;

        let result = self.fill(caller.as_ref(), session, cancel).await;

        if let Err(e) = caller.close().await {
            tracing::debug!(session = %session, error = %e, "failed to release connection");
        }
        result
    }

    async fn fill(
        &self,
        caller: &dyn ToolCaller,
        session: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<PortfolioRecord>> {
        let probe_tool = self.plan.tool(self.plan.probe);
        let authorized = self
            .handshake
            .run(caller, session, &probe_tool, cancel)
            .await?;
        tracing::info!(
            session = %session,
            probes = authorized.probes,
            "authorized, fetching portfolio"
        );

        let record = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(PortfolioError::cancelled(session)),
            record = self.fetch_all(caller, session) => record,
        };

        if record.all_failed() {
            return Err(PortfolioError::FetchAllFailed {
                session: session.to_string(),
                failures: record.into_failures(),
            });
        }

        let record = Arc::new(record);
        self.cache.insert(session, Arc::clone(&record)).await;

        if let Err(e) = self.handshake.markers().delete(session).await {
            tracing::warn!(session = %session, error = %e, "failed to remove session marker");
        }
        Ok(record)
    }

    async fn fetch_all(&self, caller: &dyn ToolCaller, session: &str) -> PortfolioRecord {
        let fetches = self.plan.resources.iter().map(|&resource| async move {
            let slot = self.fetch_one(caller, session, resource).await;
            (resource, slot)
        });
        let slots = join_all(fetches).await;

        let record = PortfolioRecord::from_slots(slots);
        tracing::info!(
            session = %session,
            fetched = record.len() - record.failures().len(),
            failed = record.failures().len(),
            "portfolio batch complete"
        );
        record
    }

    async fn fetch_one(
        &self,
        caller: &dyn ToolCaller,
        session: &str,
        resource: PortfolioResource,
    ) -> ResourceSlot {
        let tool = self.plan.tool(resource);
        let slot = match caller.call_tool(&tool, None).await {
            Err(e) => ResourceSlot::Failed(ResourceFetchError::Transport {
                message: e.to_string(),
            }),
            Ok(result) if result.is_error() => ResourceSlot::Failed(ResourceFetchError::ToolFailed {
                message: result
                    .text()
                    .unwrap_or_else(|| "tool reported an error".to_string()),
            }),
            Ok(result) => match decode(&result) {
                ToolResponse::AuthorizationPending { login_url, .. } => {
                    ResourceSlot::Failed(ResourceFetchError::AuthorizationLost { login_url })
                }
                response => ResourceSlot::Fetched(response),
            },
        };

        if let ResourceSlot::Failed(err) = &slot {
            tracing::warn!(
                session = %session,
                resource = %resource,
                tool = %tool,
                error = %err,
                "resource fetch failed"
            );
        }
        slot
    }
}
