//! Managed resources.
//!
//! Every resource implements [`Resource`]. State travels as
//! `serde_json::Value`; each resource parses it into its own typed state
//! struct with [`parse_state`] and writes it back with [`to_state`].

mod application;
mod application_agent;
mod application_agent_credential;
mod application_space;
mod authorization_policy;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::ConfigClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, DiffSuppress, Schema};
use crate::types::ImportedResource;
use crate::validation::Validator;

pub use application::ApplicationResource;
pub use application_agent::ApplicationAgentResource;
pub use application_agent_credential::ApplicationAgentCredentialResource;
pub use application_space::{ApplicationSpaceResource, WaitSchedule, IKG_STATUS_ACTIVE};
pub use authorization_policy::AuthorizationPolicyResource;

static IMPORT_GID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^gid:[A-Za-z0-9_-]{22,}$").expect("gid import pattern is a valid regex")
});

/// Summary of the error returned when deleting a protected resource.
pub const DELETE_PROTECTION_SUMMARY: &str = "Delete Protection is enabled";

/// CRUD handler of one resource type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name, for example `indykite_application`.
    fn type_name(&self) -> &'static str;

    /// Schema of the resource.
    fn schema(&self) -> Schema;

    /// Create the remote object and return the resulting state.
    async fn create(&self, client: &dyn ConfigClient, planned: Value)
        -> Result<Value, ProviderError>;

    /// Refresh state from the remote object.
    async fn read(&self, client: &dyn ConfigClient, state: Value) -> Result<Value, ProviderError>;

    /// Apply the planned state to the remote object.
    async fn update(
        &self,
        client: &dyn ConfigClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, client: &dyn ConfigClient, state: Value) -> Result<(), ProviderError>;

    /// Turn an import identifier into a state the next read completes.
    fn import(&self, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        import_by_id(self.type_name(), id)
    }
}

/// All managed resources.
pub fn all() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(ApplicationSpaceResource::new()),
        Box::new(ApplicationResource),
        Box::new(ApplicationAgentResource),
        Box::new(ApplicationAgentCredentialResource),
        Box::new(AuthorizationPolicyResource),
    ]
}

/// Accept `gid:...` identifiers and `name?location=gid:...` references.
pub fn import_by_id(resource_type: &str, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
    if !IMPORT_GID_PATTERN.is_match(id) && !id.contains("?location=") {
        return Err(ProviderError::Validation(format!(
            "Unimplemented id format: {}. Expected either 'gid:xxx' or 'resource-name?location=gid:xxx'",
            id
        )));
    }
    Ok(vec![ImportedResource::new(
        resource_type,
        serde_json::json!({ "id": id }),
    )])
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

/// Parse a state or configuration value into a typed state.
///
/// `null` attributes, nested ones included, are dropped first so they fall
/// back to the field defaults.
pub fn parse_state<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    let value = match value {
        Value::Null => Value::Object(Default::default()),
        other => strip_nulls(other),
    };
    Ok(serde_json::from_value(value)?)
}

/// Serialize a typed state.
pub fn to_state<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// Refuse to delete when `deletion_protection` is set.
pub fn ensure_deletable(deletion_protection: bool) -> Result<(), ProviderError> {
    if deletion_protection {
        return Err(ProviderError::FailedPrecondition(format!(
            "{}: Cannot destroy instance without setting deletion_protection=false and running `terraform apply`",
            DELETE_PROTECTION_SUMMARY
        )));
    }
    Ok(())
}

/// The new value when it differs from the prior one.
pub fn changed(prior: &str, planned: &str) -> Option<String> {
    (prior != planned).then(|| planned.to_string())
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn name_attribute() -> Attribute {
    Attribute::required_string()
        .with_force_new()
        .with_validator(Validator::Name)
        .with_description(
            "Unique client assigned immutable identifier. Can not be updated without creating a new resource.",
        )
}

pub(crate) fn display_name_attribute() -> Attribute {
    Attribute::optional_string()
        .with_diff_suppress(DiffSuppress::DisplayName { fallback: "name" })
        .with_description(
            "The display name for the instance. Can be updated without creating a new resource.",
        )
}

pub(crate) fn description_attribute() -> Attribute {
    Attribute::optional_string()
        .with_validator(Validator::LengthBetween(0, 65000))
        .with_description("Your own description of the resource. Must be less than or equal to 65000 UTF-8 bytes.")
}

pub(crate) fn deletion_protection_attribute() -> Attribute {
    Attribute::optional_bool()
        .with_default(Value::Bool(true))
        .with_description(
            "Whether or not to allow Terraform to destroy the instance. Unless this field is set to false in Terraform state, a `terraform destroy` or `terraform apply` that would delete the instance will fail.",
        )
}

/// Required, immutable reference to a parent object.
pub(crate) fn parent_id_attribute(description: &str) -> Attribute {
    Attribute::required_string()
        .with_force_new()
        .with_validator(Validator::Gid)
        .with_description(description)
}

pub(crate) fn computed_id_attribute(description: &str) -> Attribute {
    Attribute::computed_string().with_description(description)
}

pub(crate) fn create_time_attribute() -> Attribute {
    Attribute::computed_string().with_description("Timestamp when the resource was created.")
}

pub(crate) fn update_time_attribute() -> Attribute {
    Attribute::computed_string().with_description("Timestamp when the resource was last updated.")
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        id: String,
        tags: Vec<String>,
    }

    #[test]
    fn test_import_formats() {
        let imported = import_by_id("indykite_application", fixtures::APPLICATION_ID).unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].state, json!({"id": fixtures::APPLICATION_ID}));

        let by_name = format!("my-app?location={}", fixtures::APP_SPACE_ID);
        let imported = import_by_id("indykite_application", &by_name).unwrap();
        assert_eq!(imported[0].state["id"], by_name);
    }

    #[test]
    fn test_import_rejects_other_ids() {
        for id in ["my-app", "gid:short", "gid:has spaces in it, not base64url"] {
            let err = import_by_id("indykite_application", id).unwrap_err();
            assert!(
                err.to_string().contains("Unimplemented id format"),
                "{}: {}",
                id,
                err
            );
        }
    }

    #[test]
    fn test_parse_state_drops_nulls() {
        let state: Sample = parse_state(json!({"id": "gid:x", "tags": null, "extra": 1})).unwrap();
        assert_eq!(state.id, "gid:x");
        assert!(state.tags.is_empty());

        let state: Sample = parse_state(Value::Null).unwrap();
        assert_eq!(state, Sample::default());
    }

    #[test]
    fn test_delete_protection() {
        let err = ensure_deletable(true).unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
        assert!(err.to_string().contains(DELETE_PROTECTION_SUMMARY));
        assert!(ensure_deletable(false).is_ok());
    }

    #[test]
    fn test_changed() {
        assert_eq!(changed("a", "b"), Some("b".to_string()));
        assert_eq!(changed("a", "a"), None);
        assert_eq!(changed("a", ""), Some(String::new()));
    }

    #[test]
    fn test_all_resources_have_unique_names() {
        let mut names: Vec<&str> = all().iter().map(|r| r.type_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
    }
}
