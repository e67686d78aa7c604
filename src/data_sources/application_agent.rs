//! `indykite_application_agent` and `indykite_application_agents` data sources.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    filter_attribute, list_id, read_filter, required_parent, validate_filter, DataSource, Lookup,
};
use crate::client::ConfigClient;
use crate::error::ProviderError;
use crate::generated::config::ApplicationAgent;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validation::Validator;

/// Single application agent data source type name.
pub const DATA_SOURCE_TYPE: &str = "indykite_application_agent";
/// Application agent list data source type name.
pub const LIST_DATA_SOURCE_TYPE: &str = "indykite_application_agents";

const LOOKUP: Lookup = Lookup {
    id_key: "app_agent_id",
    location_key: "app_space_id",
};

#[derive(Debug, Serialize)]
struct ApplicationAgentItem {
    customer_id: String,
    app_space_id: String,
    application_id: String,
    id: String,
    name: String,
    display_name: String,
    description: String,
    api_permissions: Vec<String>,
}

impl From<ApplicationAgent> for ApplicationAgentItem {
    fn from(agent: ApplicationAgent) -> Self {
        Self {
            customer_id: agent.customer_id,
            app_space_id: agent.app_space_id,
            application_id: agent.application_id,
            id: agent.id,
            name: agent.name,
            display_name: agent.display_name,
            description: agent.description,
            api_permissions: agent.api_permissions,
        }
    }
}

fn item_block() -> Block {
    Block::new()
        .with_attribute("customer_id", Attribute::computed_string())
        .with_attribute("app_space_id", Attribute::computed_string())
        .with_attribute("application_id", Attribute::computed_string())
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::computed_string())
        .with_attribute("display_name", Attribute::computed_string())
        .with_attribute("description", Attribute::computed_string())
        .with_attribute("api_permissions", Attribute::computed_string_list())
}

/// Looks up one application agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationAgentDataSource;

#[async_trait]
impl DataSource for ApplicationAgentDataSource {
    fn type_name(&self) -> &'static str {
        DATA_SOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("customer_id", Attribute::computed_string())
            .with_attribute("application_id", Attribute::computed_string())
            .with_attribute("display_name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("api_permissions", Attribute::computed_string_list())
            .with_attribute("create_time", Attribute::computed_string())
            .with_attribute("update_time", Attribute::computed_string());
        LOOKUP.with_attributes(schema, "Identifier of the application agent.")
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        LOOKUP.validate(config)
    }

    async fn read(&self, client: &dyn ConfigClient, config: Value) -> Result<Value, ProviderError> {
        let agent = client
            .read_application_agent(LOOKUP.target(&config)?)
            .await?;
        Ok(json!({
            "id": agent.id,
            "app_agent_id": agent.id,
            "customer_id": agent.customer_id,
            "app_space_id": agent.app_space_id,
            "application_id": agent.application_id,
            "name": agent.name,
            "display_name": agent.display_name,
            "description": agent.description,
            "api_permissions": agent.api_permissions,
            "create_time": agent.create_time,
            "update_time": agent.update_time,
        }))
    }
}

/// Lists application agents of an application space by exact name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationAgentListDataSource;

#[async_trait]
impl DataSource for ApplicationAgentListDataSource {
    fn type_name(&self) -> &'static str {
        LIST_DATA_SOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "app_space_id",
                Attribute::required_string().with_validator(Validator::Gid),
            )
            .with_attribute("filter", filter_attribute())
            .with_block("app_agents", NestedBlock::list(item_block()))
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validate_filter(config)
    }

    async fn read(&self, client: &dyn ConfigClient, config: Value) -> Result<Value, ProviderError> {
        let app_space_id = required_parent(&config, "app_space_id")?;
        let filter = read_filter(&config)?;

        let agents: Vec<ApplicationAgentItem> = client
            .list_application_agents(&app_space_id)
            .await?
            .into_iter()
            .filter(|agent| filter.contains(&agent.name))
            .map(Into::into)
            .collect();
        debug!(app_space_id = %app_space_id, matched = agents.len(), "Listed application agents");

        Ok(json!({
            "id": list_id(&app_space_id, "appAgents", &filter),
            "app_space_id": app_space_id,
            "filter": filter,
            "app_agents": agents,
        }))
    }
}
