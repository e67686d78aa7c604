//! `indykite_application` resource.

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
use crate::generated::config::{Application, CreateApplicationRequest, UpdateApplicationRequest};
use crate::schema::Schema;

/// Resource type name.
pub const RESOURCE_TYPE: &str = "indykite_application";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ApplicationState {
    id: String,
    customer_id: String,
    app_space_id: String,
    name: String,
    display_name: String,
    description: String,
    create_time: String,
    update_time: String,
    #[serde(default = "default_true")]
    deletion_protection: bool,
}

impl ApplicationState {
    fn from_api(app: Application, deletion_protection: bool) -> Self {
        Self {
            id: app.id,
            customer_id: app.customer_id,
            app_space_id: app.app_space_id,
            name: app.name,
            display_name: app.display_name,
            description: app.description,
            create_time: app.create_time,
            update_time: app.update_time,
            deletion_protection,
        }
    }
}

/// Applications inside an application space.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationResource;

impl ApplicationResource {
    async fn fetch(
        &self,
        client: &dyn ConfigClient,
        target: ReadTarget,
        deletion_protection: bool,
    ) -> Result<Value, ProviderError> {
        let app = client.read_application(target).await?;
        to_state(&ApplicationState::from_api(app, deletion_protection))
    }
}

#[async_trait]
impl Resource for ApplicationResource {
    fn type_name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Application is an entity that represents a software system that is using IndyKite services.")
            .with_attribute("id", computed_id_attribute("Identifier of the application."))
            .with_attribute("customer_id", computed_id_attribute("Identifier of the customer."))
            .with_attribute(
                "app_space_id",
                parent_id_attribute("Identifier of the application space the application belongs to."),
            )
            .with_attribute("name", name_attribute())
            .with_attribute("display_name", display_name_attribute())
            .with_attribute("description", description_attribute())
            .with_attribute("create_time", create_time_attribute())
            .with_attribute("update_time", update_time_attribute())
            .with_attribute("deletion_protection", deletion_protection_attribute())
    }

    async fn create(
        &self,
        client: &dyn ConfigClient,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let planned: ApplicationState = parse_state(planned)?;
        let created = client
            .create_application(CreateApplicationRequest {
                project_id: planned.app_space_id.clone(),
                name: planned.name.clone(),
                display_name: planned.display_name.clone(),
                description: planned.description.clone(),
            })
            .await?;
        info!(id = %created.id, name = %planned.name, "Application created");

        self.fetch(client, ReadTarget::id(created.id), planned.deletion_protection)
            .await
    }

    async fn read(&self, client: &dyn ConfigClient, state: Value) -> Result<Value, ProviderError> {
        let state: ApplicationState = parse_state(state)?;
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
        let prior: ApplicationState = parse_state(prior)?;
        let planned: ApplicationState = parse_state(planned)?;

        let mut unchanged = planned.clone();
        unchanged.deletion_protection = prior.deletion_protection;
        if unchanged == prior {
            debug!(id = %prior.id, "Only deletion_protection changed, skipping API call");
            return to_state(&planned);
        }

        client
            .update_application(
                &prior.id,
                UpdateApplicationRequest {
                    display_name: changed(&prior.display_name, &planned.display_name),
                    description: changed(&prior.description, &planned.description),
                },
            )
            .await?;

        self.fetch(client, ReadTarget::id(prior.id), planned.deletion_protection)
            .await
    }

    async fn delete(&self, client: &dyn ConfigClient, state: Value) -> Result<(), ProviderError> {
        let state: ApplicationState = parse_state(state)?;
        ensure_deletable(state.deletion_protection)?;
        client.delete_application(&state.id).await?;
        info!(id = %state.id, "Application deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockConfigClient;
    use crate::client::{ClientError, RestError};
    use crate::matchers::{equal_proto, wrap_matcher};
    use crate::resources::fixtures::*;
    use crate::validation::validate;
    use mockall::predicate;
    use serde_json::json;

    fn api_application() -> Application {
        Application {
            id: APPLICATION_ID.to_string(),
            name: "acme-app".to_string(),
            display_name: "Acme App".to_string(),
            description: "Main application".to_string(),
            customer_id: CUSTOMER_ID.to_string(),
            app_space_id: APP_SPACE_ID.to_string(),
            create_time: CREATE_TIME.to_string(),
            update_time: UPDATE_TIME.to_string(),
            etag: "\"1\"".to_string(),
        }
    }

    fn state() -> Value {
        json!({
            "id": APPLICATION_ID,
            "customer_id": CUSTOMER_ID,
            "app_space_id": APP_SPACE_ID,
            "name": "acme-app",
            "display_name": "Acme App",
            "description": "Main application",
            "create_time": CREATE_TIME,
            "update_time": UPDATE_TIME,
            "deletion_protection": true
        })
    }

    #[test]
    fn test_schema_validation() {
        let schema = ApplicationResource.schema();
        assert!(validate(&schema, &json!({"app_space_id": APP_SPACE_ID, "name": "acme-app"})).is_empty());

        let diagnostics = validate(&schema, &json!({"app_space_id": "space", "name": "Acme"}));
        let attributes: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert!(attributes.contains(&"app_space_id"));
        assert!(attributes.contains(&"name"));
    }

    #[tokio::test]
    async fn test_create_reads_back() {
        let mut client = MockConfigClient::new();
        client
            .expect_create_application()
            .with(wrap_matcher(equal_proto(CreateApplicationRequest {
                project_id: APP_SPACE_ID.to_string(),
                name: "acme-app".to_string(),
                display_name: "Acme App".to_string(),
                description: String::new(),
            })))
            .times(1)
            .returning(|_| {
                Ok(Application {
                    id: APPLICATION_ID.to_string(),
                    ..Default::default()
                })
            });
        client
            .expect_read_application()
            .with(predicate::eq(ReadTarget::id(APPLICATION_ID)))
            .times(1)
            .returning(|_| Ok(api_application()));

        let state = ApplicationResource
            .create(
                &client,
                json!({
                    "app_space_id": APP_SPACE_ID,
                    "name": "acme-app",
                    "display_name": "Acme App",
                    "description": null,
                    "deletion_protection": false
                }),
            )
            .await
            .unwrap();

        assert_eq!(state["id"], APPLICATION_ID);
        assert_eq!(state["customer_id"], CUSTOMER_ID);
        assert_eq!(state["description"], "Main application");
        assert_eq!(state["deletion_protection"], false);
    }

    #[tokio::test]
    async fn test_read_by_imported_name() {
        let mut client = MockConfigClient::new();
        client
            .expect_read_application()
            .with(predicate::eq(ReadTarget::name("acme-app", APP_SPACE_ID)))
            .times(1)
            .returning(|_| Ok(api_application()));

        let imported = format!("acme-app?location={}", APP_SPACE_ID);
        let state = ApplicationResource
            .read(&client, json!({ "id": imported }))
            .await
            .unwrap();

        assert_eq!(state["id"], APPLICATION_ID);
        assert_eq!(state["deletion_protection"], true);
    }

    #[tokio::test]
    async fn test_read_missing() {
        let mut client = MockConfigClient::new();
        client
            .expect_read_application()
            .returning(|_| Err(ClientError::Rest(RestError::new(404, "not found"))));

        let err = ApplicationResource.read(&client, state()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_sends_changed_fields() {
        let mut client = MockConfigClient::new();
        client
            .expect_update_application()
            .with(
                predicate::eq(APPLICATION_ID),
                wrap_matcher(equal_proto(UpdateApplicationRequest {
                    display_name: None,
                    description: Some("Renamed".to_string()),
                })),
            )
            .times(1)
            .returning(|_, _| Ok(api_application()));
        client
            .expect_read_application()
            .times(1)
            .returning(|_| {
                Ok(Application {
                    description: "Renamed".to_string(),
                    ..api_application()
                })
            });

        let mut planned = state();
        planned["description"] = json!("Renamed");
        let state = ApplicationResource
            .update(&client, state(), planned)
            .await
            .unwrap();
        assert_eq!(state["description"], "Renamed");
    }

    #[tokio::test]
    async fn test_update_only_deletion_protection() {
        let client = MockConfigClient::new();

        let mut planned = state();
        planned["deletion_protection"] = json!(false);
        let state = ApplicationResource
            .update(&client, state(), planned)
            .await
            .unwrap();
        assert_eq!(state["deletion_protection"], false);
    }

    #[tokio::test]
    async fn test_delete_protection() {
        let client = MockConfigClient::new();
        let err = ApplicationResource.delete(&client, state()).await.unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));

        let mut client = MockConfigClient::new();
        client
            .expect_delete_application()
            .with(predicate::eq(APPLICATION_ID))
            .times(1)
            .returning(|_| Ok(()));
        let mut state = state();
        state["deletion_protection"] = json!(false);
        ApplicationResource.delete(&client, state).await.unwrap();
    }
}
