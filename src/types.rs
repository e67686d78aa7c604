//! Plan, import and metadata values exchanged with the host runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generated::provider as proto;

/// Version announced in the handshake line.
pub const PROTOCOL_VERSION: u32 = 1;

/// First field of the handshake line printed on stdout.
pub const HANDSHAKE_PREFIX: &str = "INDYKITE_PROVIDER";

/// One attribute a plan changes. `None` stands for unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub path: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AttributeChange {
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// The attribute goes away, as on destroy.
    pub fn removed(path: impl Into<String>, before: Value) -> Self {
        Self::new(path, Some(before), None)
    }
}

impl From<AttributeChange> for proto::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        let encode = |value: Option<Value>| {
            value
                .and_then(|v| serde_json::to_vec(&v).ok())
                .unwrap_or_default()
        };
        Self {
            before: encode(change.before),
            after: encode(change.after),
            path: change.path,
        }
    }
}

/// Outcome of planning one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State the host will pass to create or update. `null` on destroy.
    pub planned_state: Value,
    pub changes: Vec<AttributeChange>,
    /// A changed attribute cannot be updated in place.
    pub requires_replace: bool,
}

impl PlanResult {
    pub fn new(planned_state: Value, changes: Vec<AttributeChange>, requires_replace: bool) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn changed_paths(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.path.as_str()).collect()
    }
}

/// State seeded by an import; the host completes it with a read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    pub resource_type: String,
    pub state: Value,
}

impl ImportedResource {
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

impl From<ImportedResource> for proto::ImportedResource {
    fn from(imported: ImportedResource) -> Self {
        Self {
            state: serde_json::to_vec(&imported.state).unwrap_or_default(),
            resource_type: imported.resource_type,
        }
    }
}

/// Answer to `GetMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names, sorted.
    pub resources: Vec<String>,
    /// Data source type names, sorted.
    pub data_sources: Vec<String>,
    pub capabilities: ServerCapabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// The host may ask for a plan when a resource is removed from config.
    pub plan_destroy: bool,
}
