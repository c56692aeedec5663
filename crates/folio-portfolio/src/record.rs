//! Aggregated portfolio record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::decode::ToolResponse;
use crate::error::ResourceFetchError;
use crate::resource::PortfolioResource;

/// Outcome of fetching one resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSlot {
    /// The decoded response.
    Fetched(ToolResponse),
    /// Why the resource is missing.
    Failed(ResourceFetchError),
}

impl ResourceSlot {
    /// Check if the slot holds a failure marker.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Every requested resource mapped to its outcome.
///
/// Assembled once by the fetcher and then shared read-only.
#[derive(Debug, Clone)]
pub struct PortfolioRecord {
    slots: BTreeMap<PortfolioResource, ResourceSlot>,
    fetched_at: DateTime<Utc>,
}

impl PortfolioRecord {
    /// Assemble a record from per-resource outcomes.
    pub fn from_slots(slots: impl IntoIterator<Item = (PortfolioResource, ResourceSlot)>) -> Self {
        Self {
            slots: slots.into_iter().collect(),
            fetched_at: Utc::now(),
        }
    }

    /// When the batch finished.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Number of resources in the record.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the record holds no resources.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The outcome for one resource, if it was requested.
    pub fn get(&self, resource: PortfolioResource) -> Option<&ResourceSlot> {
        self.slots.get(&resource)
    }

    /// The decoded response for one resource, if it was fetched.
    pub fn data(&self, resource: PortfolioResource) -> Option<&ToolResponse> {
        match self.slots.get(&resource) {
            Some(ResourceSlot::Fetched(response)) => Some(response),
            _ => None,
        }
    }

    /// Iterate resources and their outcomes in record order.
    pub fn iter(&self) -> impl Iterator<Item = (PortfolioResource, &ResourceSlot)> {
        self.slots.iter().map(|(r, s)| (*r, s))
    }

    /// Resources that failed, with their reasons.
    pub fn failures(&self) -> Vec<(PortfolioResource, &ResourceFetchError)> {
        self.slots
            .iter()
            .filter_map(|(r, s)| match s {
                ResourceSlot::Failed(err) => Some((*r, err)),
                ResourceSlot::Fetched(_) => None,
            })
            .collect()
    }

    /// True when no resource failed.
    pub fn is_complete(&self) -> bool {
        self.slots.values().all(|s| !s.is_failed())
    }

    /// True when every resource failed.
    pub fn all_failed(&self) -> bool {
        !self.slots.is_empty() && self.slots.values().all(ResourceSlot::is_failed)
    }

    /// Consume the record, keeping only its failures.
    pub fn into_failures(self) -> Vec<(PortfolioResource, ResourceFetchError)> {
        self.slots
            .into_iter()
            .filter_map(|(r, s)| match s {
                ResourceSlot::Failed(err) => Some((r, err)),
                ResourceSlot::Fetched(_) => None,
            })
            .collect()
    }

    /// JSON form: every planned resource under its key, `null` for a failed
    /// one, with failure reason codes listed under `unavailable`.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        let mut unavailable = Map::new();
        for (resource, slot) in &self.slots {
            match slot {
                ResourceSlot::Fetched(response) => {
                    out.insert(resource.key().to_string(), response.to_json());
                }
                ResourceSlot::Failed(err) => {
                    out.insert(resource.key().to_string(), Value::Null);
                    unavailable.insert(resource.key().to_string(), json!({"reason": err.kind()}));
                }
            }
        }
        if !unavailable.is_empty() {
            out.insert("unavailable".to_string(), Value::Object(unavailable));
        }
        out.insert(
            "fetched_at".to_string(),
            Value::String(self.fetched_at.to_rfc3339()),
        );
        Value::Object(out)
    }

    /// JSON form of one resource.
    pub fn resource_json(&self, resource: PortfolioResource) -> Value {
        match self.slots.get(&resource) {
            Some(ResourceSlot::Fetched(response)) => json!({ resource.key(): response.to_json() }),
            Some(ResourceSlot::Failed(err)) => json!({
                resource.key(): null,
                "unavailable": { resource.key(): {"reason": err.kind()} }
            }),
            None => json!({
                "unavailable": { resource.key(): {"reason": "not_requested"} }
            }),
        }
    }

    /// Pretty-printed [`PortfolioRecord::to_json`].
    pub fn to_pretty_json(&self) -> String {
        let value = self.to_json();
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    }
}
