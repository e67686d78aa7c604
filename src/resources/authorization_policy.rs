//! `indykite_authorization_policy` resource.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{
    changed, computed_id_attribute, create_time_attribute, description_attribute,
    display_name_attribute, name_attribute, parent_id_attribute, parse_state, to_state,
    update_time_attribute, Resource,
};
use crate::client::{ConfigClient, ReadTarget};
use crate::error::ProviderError;
use crate::generated::config::{
    AuthorizationPolicy, CreateAuthorizationPolicyRequest, UpdateAuthorizationPolicyRequest,
};
use crate::schema::{Attribute, DiffSuppress, Schema};
use crate::validation::Validator;

/// Resource type name.
pub const RESOURCE_TYPE: &str = "indykite_authorization_policy";

/// Configured policy status and its API counterpart.
const STATUSES: &[(&str, &str)] = &[("active", "ACTIVE"), ("inactive", "INACTIVE")];

/// Map a configured status to the API value.
pub fn status_to_api(status: &str) -> String {
    STATUSES
        .iter()
        .find(|(config, _)| *config == status)
        .map(|(_, api)| api.to_string())
        .unwrap_or_else(|| status.to_string())
}

/// Map an API status to the configured value, passing unknown values through.
pub fn status_from_api(status: &str) -> String {
    STATUSES
        .iter()
        .find(|(_, api)| *api == status)
        .map(|(config, _)| config.to_string())
        .unwrap_or_else(|| status.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AuthorizationPolicyState {
    id: String,
    location: String,
    customer_id: String,
    app_space_id: String,
    name: String,
    display_name: String,
    description: String,
    json: String,
    status: String,
    tags: Vec<String>,
    create_time: String,
    update_time: String,
}

impl AuthorizationPolicyState {
    fn from_api(policy: AuthorizationPolicy) -> Self {
        let location = if !policy.app_space_id.is_empty() {
            policy.app_space_id.clone()
        } else {
            policy.customer_id.clone()
        };
        Self {
            id: policy.id,
            location,
            customer_id: policy.customer_id,
            app_space_id: policy.app_space_id,
            name: policy.name,
            display_name: policy.display_name,
            description: policy.description,
            json: policy.policy,
            status: status_from_api(&policy.status),
            tags: policy.tags,
            create_time: policy.create_time,
            update_time: policy.update_time,
        }
    }
}

/// Knowledge-based access control policies.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationPolicyResource;

impl AuthorizationPolicyResource {
    async fn fetch(
        &self,
        client: &dyn ConfigClient,
        target: ReadTarget,
    ) -> Result<Value, ProviderError> {
        let policy = client.read_authorization_policy(target).await?;
        to_state(&AuthorizationPolicyState::from_api(policy))
    }
}

#[async_trait]
impl Resource for AuthorizationPolicyResource {
    fn type_name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("KBAC leverages the IndyKite Knowledge Graph to express the relationships and context present in the real-world, digitally and deliver context-aware, fine-grained authorization decisions.")
            .with_attribute("id", computed_id_attribute("Identifier of the policy."))
            .with_attribute(
                "location",
                parent_id_attribute("Identifier of the application space the policy belongs to."),
            )
            .with_attribute("customer_id", computed_id_attribute("Identifier of the customer."))
            .with_attribute(
                "app_space_id",
                computed_id_attribute("Identifier of the application space."),
            )
            .with_attribute("name", name_attribute())
            .with_attribute("display_name", display_name_attribute())
            .with_attribute("description", description_attribute())
            .with_attribute(
                "json",
                Attribute::required_string()
                    .with_validator(Validator::NotEmpty)
                    .with_validator(Validator::Json)
                    .with_diff_suppress(DiffSuppress::Json)
                    .with_description("Configuration of Authorization Policy in JSON format, the same one exported by The Hub."),
            )
            .with_attribute(
                "status",
                Attribute::required_string()
                    .with_validator(Validator::one_of(STATUSES.iter().map(|(config, _)| *config)))
                    .with_description("Status of the Authorization Policy. Possible values are: active, inactive."),
            )
            .with_attribute(
                "tags",
                Attribute::optional_string_list().with_description("Tags of the Authorization Policy."),
            )
            .with_attribute("create_time", create_time_attribute())
            .with_attribute("update_time", update_time_attribute())
    }

    async fn create(
        &self,
        client: &dyn ConfigClient,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let planned: AuthorizationPolicyState = parse_state(planned)?;
        let created = client
            .create_authorization_policy(CreateAuthorizationPolicyRequest {
                project_id: planned.location.clone(),
                name: planned.name.clone(),
                display_name: planned.display_name.clone(),
                description: planned.description.clone(),
                policy: planned.json.clone(),
                status: status_to_api(&planned.status),
                tags: planned.tags.clone(),
            })
            .await?;
        info!(id = %created.id, name = %planned.name, "Authorization policy created");

        self.fetch(client, ReadTarget::id(created.id)).await
    }

    async fn read(&self, client: &dyn ConfigClient, state: Value) -> Result<Value, ProviderError> {
        let state: AuthorizationPolicyState = parse_state(state)?;
        self.fetch(client, ReadTarget::from_state_id(&state.id)).await
    }

    async fn update(
        &self,
        client: &dyn ConfigClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: AuthorizationPolicyState = parse_state(prior)?;
        let planned: AuthorizationPolicyState = parse_state(planned)?;

        let tags = if prior.tags != planned.tags {
            planned.tags.clone()
        } else {
            Vec::new()
        };
        client
            .update_authorization_policy(
                &prior.id,
                UpdateAuthorizationPolicyRequest {
                    display_name: changed(&prior.display_name, &planned.display_name),
                    description: changed(&prior.description, &planned.description),
                    policy: changed(&prior.json, &planned.json),
                    status: changed(&prior.status, &planned.status).map(|s| status_to_api(&s)),
                    tags,
                },
            )
            .await?;

        self.fetch(client, ReadTarget::id(prior.id)).await
    }

    async fn delete(&self, client: &dyn ConfigClient, state: Value) -> Result<(), ProviderError> {
        let state: AuthorizationPolicyState = parse_state(state)?;
        client.delete_authorization_policy(&state.id).await?;
        info!(id = %state.id, "Authorization policy deleted");
        Ok(())
    }
}
