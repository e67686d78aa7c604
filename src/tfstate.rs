//! Verification of a host state file against the configuration API.
//!
//! [`TerraformState`] reads the JSON state file the host runtime writes
//! after an apply. [`StateVerifier`] then reads every managed object it
//! references and checks the API still knows it under the same identifier.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{ClientError, ConfigClient, ReadTarget};

/// Errors raised while loading or verifying a state file.
#[derive(Debug, Error)]
pub enum StateError {
    /// The state file could not be read.
    #[error("failed to read state file {path}: {source}")]
    Io {
        /// Path of the state file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The state file is not valid state JSON.
    #[error("failed to parse state: {0}")]
    Json(#[from] serde_json::Error),

    /// The API failed for a reason other than a missing object.
    #[error("failed to read {name}: {source}")]
    Client {
        /// Resource name in the state file.
        name: String,
        /// Underlying error.
        #[source]
        source: ClientError,
    },
}

/// A state file written by the host runtime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TerraformState {
    /// Resources and data sources recorded in the state.
    #[serde(default)]
    pub resources: Vec<StateResource>,
}

/// One resource block of a state file.
#[derive(Debug, Clone, Deserialize)]
pub struct StateResource {
    /// `managed` or `data`.
    #[serde(default)]
    pub mode: String,
    /// Resource type, for example `indykite_application`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Local name of the resource in configuration.
    pub name: String,
    /// Instances of the resource.
    #[serde(default)]
    pub instances: Vec<StateInstance>,
}

/// One instance of a state resource.
#[derive(Debug, Clone, Deserialize)]
pub struct StateInstance {
    /// Attribute values of the instance.
    #[serde(default)]
    pub attributes: Value,
}

impl StateResource {
    /// Whether the block describes a managed resource rather than a data source.
    pub fn is_managed(&self) -> bool {
        self.mode == "managed"
    }

    /// The `id` attribute of the first instance.
    pub fn id(&self) -> Option<&str> {
        self.instances
            .first()
            .and_then(|i| i.attributes.get("id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }
}

impl TerraformState {
    /// Load a state file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&data)
    }

    /// Parse state JSON.
    pub fn from_json(data: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Identifier of the first instance of every resource, keyed by name.
    ///
    /// When several blocks share a name the last one wins, as in
    /// [`id_of`](Self::id_of). A name whose last block has no id is left out.
    pub fn ids_by_name(&self) -> BTreeMap<String, String> {
        let mut ids = BTreeMap::new();
        for resource in &self.resources {
            match resource.id() {
                Some(id) => ids.insert(resource.name.clone(), id.to_string()),
                None => ids.remove(&resource.name),
            };
        }
        ids
    }

    /// Identifier recorded for the resource called `name`.
    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.resources
            .iter()
            .rev()
            .find(|r| r.name == name)
            .and_then(StateResource::id)
    }
}

/// Result of checking one state resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The object exists with the recorded identifier.
    Verified,
    /// The API reports the object as missing.
    Missing,
    /// The object exists but does not carry the expected value.
    Mismatch {
        /// Attribute that differs.
        field: &'static str,
        /// Value recorded in the state.
        expected: String,
        /// Value reported by the API.
        actual: String,
    },
    /// The resource was not checked.
    Skipped(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => write!(f, "verified"),
            Self::Missing => write!(f, "missing"),
            Self::Mismatch {
                field,
                expected,
                actual,
            } => write!(f, "{} mismatch: expected {:?}, got {:?}", field, expected, actual),
            Self::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

/// Outcome of one state resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Resource type.
    pub resource_type: String,
    /// Local name.
    pub name: String,
    /// Recorded identifier, if any.
    pub id: Option<String>,
    /// What the check found.
    pub outcome: Outcome,
}

impl Verification {
    /// Whether the check failed. Skipped resources do not fail.
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Missing | Outcome::Mismatch { .. })
    }
}

/// Reads every managed object of a state file through a [`ConfigClient`].
pub struct StateVerifier<'a> {
    client: &'a dyn ConfigClient,
}

impl<'a> StateVerifier<'a> {
    /// Create a verifier reading through `client`.
    pub fn new(client: &'a dyn ConfigClient) -> Self {
        Self { client }
    }

    /// Check every resource of `state`, in file order.
    pub async fn verify(&self, state: &TerraformState) -> Result<Vec<Verification>, StateError> {
        let mut results = Vec::with_capacity(state.resources.len());
        for resource in &state.resources {
            let outcome = self.verify_resource(resource).await?;
            match &outcome {
                Outcome::Verified => debug!(name = %resource.name, "Resource verified"),
                Outcome::Skipped(reason) => debug!(name = %resource.name, reason = %reason, "Resource skipped"),
                other => warn!(name = %resource.name, outcome = %other, "Resource verification failed"),
            }
            results.push(Verification {
                resource_type: resource.resource_type.clone(),
                name: resource.name.clone(),
                id: resource.id().map(str::to_string),
                outcome,
            });
        }
        info!(
            checked = results.len(),
            failed = results.iter().filter(|r| r.is_failure()).count(),
            "State verification finished"
        );
        Ok(results)
    }

    async fn verify_resource(&self, resource: &StateResource) -> Result<Outcome, StateError> {
        if !resource.is_managed() {
            return Ok(Outcome::Skipped("data source".to_string()));
        }
        let Some(id) = resource.id() else {
            return Ok(Outcome::Skipped("no id recorded".to_string()));
        };

        let target = || ReadTarget::id(id);
        let read = match resource.resource_type.as_str() {
            "indykite_application_space" => self
                .client
                .read_application_space(target())
                .await
                .map(|o| (o.id, None)),
            "indykite_application" => self
                .client
                .read_application(target())
                .await
                .map(|o| (o.id, None)),
            "indykite_application_agent" => self
                .client
                .read_application_agent(target())
                .await
                .map(|o| (o.id, None)),
            "indykite_application_agent_credential" => self
                .client
                .read_application_agent_credential(id)
                .await
                .map(|o| (o.id, None)),
            "indykite_authorization_policy" => self
                .client
                .read_authorization_policy(target())
                .await
                .map(|o| (o.id, Some(o.policy))),
            other => return Ok(Outcome::Skipped(format!("unsupported type {}", other))),
        };

        match read {
            Ok((actual, _)) if actual != id => Ok(Outcome::Mismatch {
                field: "id",
                expected: id.to_string(),
                actual,
            }),
            Ok((_, Some(policy))) if policy.is_empty() => Ok(Outcome::Mismatch {
                field: "json",
                expected: "policy document".to_string(),
                actual: policy,
            }),
            Ok(_) => Ok(Outcome::Verified),
            Err(e) if e.is_not_found() => Ok(Outcome::Missing),
            Err(source) => Err(StateError::Client {
                name: resource.name.clone(),
                source,
            }),
        }
    }
}
