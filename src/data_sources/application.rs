//! `indykite_application` and `indykite_applications` data sources.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    filter_attribute, list_id, read_filter, required_parent, validate_filter, DataSource, Lookup,
};
use crate::client::ConfigClient;
use crate::error::ProviderError;
use crate::generated::config::Application;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validation::Validator;

/// Single application data source type name.
pub const DATA_SOURCE_TYPE: &str = "indykite_application";
/// Application list data source type name.
pub const LIST_DATA_SOURCE_TYPE: &str = "indykite_applications";

const LOOKUP: Lookup = Lookup {
    id_key: "application_id",
    location_key: "app_space_id",
};

#[derive(Debug, Serialize)]
struct ApplicationItem {
    customer_id: String,
    app_space_id: String,
    id: String,
    name: String,
    display_name: String,
    description: String,
}

impl From<Application> for ApplicationItem {
    fn from(app: Application) -> Self {
        Self {
            customer_id: app.customer_id,
            app_space_id: app.app_space_id,
            id: app.id,
            name: app.name,
            display_name: app.display_name,
            description: app.description,
        }
    }
}

/// Looks up one application.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationDataSource;

#[async_trait]
impl DataSource for ApplicationDataSource {
    fn type_name(&self) -> &'static str {
        DATA_SOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("customer_id", Attribute::computed_string())
            .with_attribute("display_name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("create_time", Attribute::computed_string())
            .with_attribute("update_time", Attribute::computed_string());
        LOOKUP.with_attributes(schema, "Identifier of the application.")
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        LOOKUP.validate(config)
    }

    async fn read(&self, client: &dyn ConfigClient, config: Value) -> Result<Value, ProviderError> {
        let app = client.read_application(LOOKUP.target(&config)?).await?;
        Ok(json!({
            "id": app.id,
            "application_id": app.id,
            "customer_id": app.customer_id,
            "app_space_id": app.app_space_id,
            "name": app.name,
            "display_name": app.display_name,
            "description": app.description,
            "create_time": app.create_time,
            "update_time": app.update_time,
        }))
    }
}

/// Lists applications of an application space by exact name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationListDataSource;

#[async_trait]
impl DataSource for ApplicationListDataSource {
    fn type_name(&self) -> &'static str {
        LIST_DATA_SOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        let item = Block::new()
            .with_attribute("customer_id", Attribute::computed_string())
            .with_attribute("app_space_id", Attribute::computed_string())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("display_name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string());
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "app_space_id",
                Attribute::required_string().with_validator(Validator::Gid),
            )
            .with_attribute("filter", filter_attribute())
            .with_block("applications", NestedBlock::list(item))
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validate_filter(config)
    }

    async fn read(&self, client: &dyn ConfigClient, config: Value) -> Result<Value, ProviderError> {
        let app_space_id = required_parent(&config, "app_space_id")?;
        let filter = read_filter(&config)?;

        let applications: Vec<ApplicationItem> = client
            .list_applications(&app_space_id)
            .await?
            .into_iter()
            .filter(|app| filter.contains(&app.name))
            .map(Into::into)
            .collect();
        debug!(app_space_id = %app_space_id, matched = applications.len(), "Listed applications");

        Ok(json!({
            "id": list_id(&app_space_id, "applications", &filter),
            "app_space_id": app_space_id,
            "filter": filter,
            "applications": applications,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockConfigClient;
    use crate::client::ReadTarget;
    use crate::resources::fixtures::*;
    use mockall::predicate;

    fn app(name: &str) -> Application {
        Application {
            id: APPLICATION_ID.to_string(),
            name: name.to_string(),
            customer_id: CUSTOMER_ID.to_string(),
            app_space_id: APP_SPACE_ID.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_read_by_id() {
        let mut client = MockConfigClient::new();
        client
            .expect_read_application()
            .with(predicate::eq(ReadTarget::id(APPLICATION_ID)))
            .times(1)
            .returning(|_| Ok(app("acme-app")));

        let state = ApplicationDataSource
            .read(&client, json!({"application_id": APPLICATION_ID}))
            .await
            .unwrap();
        assert_eq!(state["name"], "acme-app");
        assert_eq!(state["app_space_id"], APP_SPACE_ID);
    }

    #[test]
    fn test_validate_requires_location_for_name() {
        let diagnostics = ApplicationDataSource.validate(&json!({"name": "acme-app"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("name"));
    }

    #[tokio::test]
    async fn test_list() {
        let mut client = MockConfigClient::new();
        client
            .expect_list_applications()
            .with(predicate::eq(APP_SPACE_ID))
            .times(1)
            .returning(|_| Ok(vec![app("web"), app("mobile")]));

        let state = ApplicationListDataSource
            .read(&client, json!({"app_space_id": APP_SPACE_ID, "filter": ["mobile"]}))
            .await
            .unwrap();
        assert_eq!(state["id"], format!("{}/applications/mobile", APP_SPACE_ID));
        assert_eq!(state["applications"].as_array().unwrap().len(), 1);
        assert_eq!(state["applications"][0]["name"], "mobile");
    }
}
