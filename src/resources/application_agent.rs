//! `indykite_application_agent` resource.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{
    changed, computed_id_attribute, create_time_attribute, default_true,
    deletion_protection_attribute, description_attribute, display_name_attribute,
    ensure_deletable, name_attribute, parent_id_attribute, parse_state, to_state,
    update_time_attribute, Resource,
};
use crate::client::{ConfigClient, ReadTarget};
use crate::error::ProviderError;
use crate::generated::config::{
    ApplicationAgent, CreateApplicationAgentRequest, UpdateApplicationAgentRequest,
};
use crate::schema::{Attribute, Schema};
use crate::validation::Validator;

/// Resource type name.
pub const RESOURCE_TYPE: &str = "indykite_application_agent";

/// Permissions an agent can be granted.
pub const API_PERMISSIONS: &[&str] = &[
    "Authorization",
    "Capture",
    "ContXIQ",
    "EntityMatching",
    "IKGRead",
    "TrustedDataAccess",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ApplicationAgentState {
    id: String,
    customer_id: String,
    app_space_id: String,
    application_id: String,
    name: String,
    display_name: String,
    description: String,
    api_permissions: Vec<String>,
    create_time: String,
    update_time: String,
    #[serde(default = "default_true")]
    deletion_protection: bool,
}

impl ApplicationAgentState {
    fn from_api(agent: ApplicationAgent, deletion_protection: bool) -> Self {
        Self {
            id: agent.id,
            customer_id: agent.customer_id,
            app_space_id: agent.app_space_id,
            application_id: agent.application_id,
            name: agent.name,
            display_name: agent.display_name,
            description: agent.description,
            api_permissions: agent.api_permissions,
            create_time: agent.create_time,
            update_time: agent.update_time,
            deletion_protection,
        }
    }
}

/// Agents act on behalf of an application.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationAgentResource;

impl ApplicationAgentResource {
    async fn fetch(
        &self,
        client: &dyn ConfigClient,
        target: ReadTarget,
        deletion_protection: bool,
    ) -> Result<Value, ProviderError> {
        let agent = client.read_application_agent(target).await?;
        to_state(&ApplicationAgentState::from_api(agent, deletion_protection))
    }
}

#[async_trait]
impl Resource for ApplicationAgentResource {
    fn type_name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", computed_id_attribute("Identifier of the application agent."))
            .with_attribute("customer_id", computed_id_attribute("Identifier of the customer."))
            .with_attribute(
                "app_space_id",
                computed_id_attribute("Identifier of the application space."),
            )
            .with_attribute(
                "application_id",
                parent_id_attribute("Identifier of the application the agent belongs to."),
            )
            .with_attribute("name", name_attribute())
            .with_attribute("display_name", display_name_attribute())
            .with_attribute("description", description_attribute())
            .with_attribute(
                "api_permissions",
                Attribute::required_string_list()
                    .with_validator(Validator::one_of(API_PERMISSIONS.iter().copied()))
                    .with_description("API permissions granted to the agent."),
            )
            .with_attribute("create_time", create_time_attribute())
            .with_attribute("update_time", update_time_attribute())
            .with_attribute("deletion_protection", deletion_protection_attribute())
    }

    async fn create(
        &self,
        client: &dyn ConfigClient,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let planned: ApplicationAgentState = parse_state(planned)?;
        let created = client
            .create_application_agent(CreateApplicationAgentRequest {
                application_id: planned.application_id.clone(),
                name: planned.name.clone(),
                display_name: planned.display_name.clone(),
                description: planned.description.clone(),
                api_permissions: planned.api_permissions.clone(),
            })
            .await?;
        info!(id = %created.id, name = %planned.name, "Application agent created");

        self.fetch(client, ReadTarget::id(created.id), planned.deletion_protection)
            .await
    }

    async fn read(&self, client: &dyn ConfigClient, state: Value) -> Result<Value, ProviderError> {
        let state: ApplicationAgentState = parse_state(state)?;
        self.fetch(
            client,
            ReadTarget::from_state_id(&state.id),
            state.deletion_protection,
        )
        .await
    }

    async fn update(
        &self,
        client: &dyn ConfigClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: ApplicationAgentState = parse_state(prior)?;
        let planned: ApplicationAgentState = parse_state(planned)?;

        let mut unchanged = planned.clone();
        unchanged.deletion_protection = prior.deletion_protection;
        if unchanged == prior {
            debug!(id = %prior.id, "Only deletion_protection changed, skipping API call");
            return to_state(&planned);
        }

        let api_permissions = if prior.api_permissions != planned.api_permissions {
            planned.api_permissions.clone()
        } else {
            Vec::new()
        };
        client
            .update_application_agent(
                &prior.id,
                UpdateApplicationAgentRequest {
                    display_name: changed(&prior.display_name, &planned.display_name),
                    description: changed(&prior.description, &planned.description),
                    api_permissions,
                },
            )
            .await?;

        self.fetch(client, ReadTarget::id(prior.id), planned.deletion_protection)
            .await
    }

    async fn delete(&self, client: &dyn ConfigClient, state: Value) -> Result<(), ProviderError> {
        let state: ApplicationAgentState = parse_state(state)?;
        ensure_deletable(state.deletion_protection)?;
        client.delete_application_agent(&state.id).await?;
        info!(id = %state.id, "Application agent deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockConfigClient;
    use crate::matchers::{equal_proto, wrap_matcher};
    use crate::resources::fixtures::*;
    use crate::validation::validate;
    use mockall::predicate;
    use serde_json::json;

    fn api_agent() -> ApplicationAgent {
        ApplicationAgent {
            id: APP_AGENT_ID.to_string(),
            name: "acme-agent".to_string(),
            display_name: "acme-agent".to_string(),
            customer_id: CUSTOMER_ID.to_string(),
            app_space_id: APP_SPACE_ID.to_string(),
            application_id: APPLICATION_ID.to_string(),
            api_permissions: vec!["Authorization".to_string(), "Capture".to_string()],
            create_time: CREATE_TIME.to_string(),
            update_time: UPDATE_TIME.to_string(),
            ..Default::default()
        }
    }

    fn state() -> Value {
        json!({
            "id": APP_AGENT_ID,
            "customer_id": CUSTOMER_ID,
            "app_space_id": APP_SPACE_ID,
            "application_id": APPLICATION_ID,
            "name": "acme-agent",
            "display_name": "acme-agent",
            "description": "",
            "api_permissions": ["Authorization", "Capture"],
            "create_time": CREATE_TIME,
            "update_time": UPDATE_TIME,
            "deletion_protection": false
        })
    }

    #[test]
    fn test_api_permissions_are_validated() {
        let schema = ApplicationAgentResource.schema();
        let config = json!({
            "application_id": APPLICATION_ID,
            "name": "acme-agent",
            "api_permissions": ["Authorization", "Teleport"]
        });
        let diagnostics = validate(&schema, &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("api_permissions.1"));

        let config = json!({"application_id": APPLICATION_ID, "name": "acme-agent"});
        let diagnostics = validate(&schema, &config);
        assert!(diagnostics[0].summary.contains("api_permissions"));
    }

    #[tokio::test]
    async fn test_create() {
        let mut client = MockConfigClient::new();
        client
            .expect_create_application_agent()
            .with(wrap_matcher(equal_proto(CreateApplicationAgentRequest {
                application_id: APPLICATION_ID.to_string(),
                name: "acme-agent".to_string(),
                display_name: String::new(),
                description: String::new(),
                api_permissions: vec!["Authorization".to_string(), "Capture".to_string()],
            })))
            .times(1)
            .returning(|_| Ok(api_agent()));
        client
            .expect_read_application_agent()
            .with(predicate::eq(ReadTarget::id(APP_AGENT_ID)))
            .times(1)
            .returning(|_| Ok(api_agent()));

        let state = ApplicationAgentResource
            .create(
                &client,
                json!({
                    "application_id": APPLICATION_ID,
                    "name": "acme-agent",
                    "api_permissions": ["Authorization", "Capture"],
                    "deletion_protection": true
                }),
            )
            .await
            .unwrap();
        assert_eq!(state["id"], APP_AGENT_ID);
        assert_eq!(state["app_space_id"], APP_SPACE_ID);
        assert_eq!(state["display_name"], "acme-agent");
    }

    #[tokio::test]
    async fn test_update_permissions() {
        let mut client = MockConfigClient::new();
        client
            .expect_update_application_agent()
            .with(
                predicate::eq(APP_AGENT_ID),
                wrap_matcher(equal_proto(UpdateApplicationAgentRequest {
                    display_name: None,
                    description: None,
                    api_permissions: vec!["IKGRead".to_string()],
                })),
            )
            .times(1)
            .returning(|_, _| Ok(api_agent()));
        client.expect_read_application_agent().times(1).returning(|_| {
            Ok(ApplicationAgent {
                api_permissions: vec!["IKGRead".to_string()],
                ..api_agent()
            })
        });

        let mut planned = state();
        planned["api_permissions"] = json!(["IKGRead"]);
        let state = ApplicationAgentResource
            .update(&client, state(), planned)
            .await
            .unwrap();
        assert_eq!(state["api_permissions"], json!(["IKGRead"]));
    }

    #[tokio::test]
    async fn test_delete() {
        let mut client = MockConfigClient::new();
        client
            .expect_delete_application_agent()
            .with(predicate::eq(APP_AGENT_ID))
            .times(1)
            .returning(|_| Ok(()));
        ApplicationAgentResource.delete(&client, state()).await.unwrap();
    }
}
