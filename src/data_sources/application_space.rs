//! `indykite_application_space` and `indykite_application_spaces` data sources.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    filter_attribute, list_id, read_filter, required_parent, validate_filter, DataSource, Lookup,
};
use crate::client::ConfigClient;
use crate::error::ProviderError;
use crate::generated::config::ApplicationSpace;
use crate::schema::{Attribute, Diagnostic, NestedBlock, Block, Schema};
use crate::validation::Validator;

/// Single application space data source type name.
pub const DATA_SOURCE_TYPE: &str = "indykite_application_space";
/// Application space list data source type name.
pub const LIST_DATA_SOURCE_TYPE: &str = "indykite_application_spaces";

const LOOKUP: Lookup = Lookup {
    id_key: "app_space_id",
    location_key: "customer_id",
};

/// Looks up one application space.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationSpaceDataSource;

#[async_trait]
impl DataSource for ApplicationSpaceDataSource {
    fn type_name(&self) -> &'static str {
        DATA_SOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_description("It is workspace or environment for your applications.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("display_name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("region", Attribute::computed_string())
            .with_attribute("ikg_size", Attribute::computed_string())
            .with_attribute("replica_region", Attribute::computed_string())
            .with_attribute("create_time", Attribute::computed_string())
            .with_attribute("update_time", Attribute::computed_string());
        LOOKUP.with_attributes(schema, "Identifier of the application space.")
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        LOOKUP.validate(config)
    }

    async fn read(&self, client: &dyn ConfigClient, config: Value) -> Result<Value, ProviderError> {
        let space = client
            .read_application_space(LOOKUP.target(&config)?)
            .await?;
        Ok(json!({
            "id": space.id,
            "app_space_id": space.id,
            "customer_id": space.customer_id,
            "name": space.name,
            "display_name": space.display_name,
            "description": space.description,
            "region": space.region,
            "ikg_size": space.ikg_size,
            "replica_region": space.replica_region,
            "create_time": space.create_time,
            "update_time": space.update_time,
        }))
    }
}

#[derive(Debug, Serialize)]
struct ApplicationSpaceItem {
    customer_id: String,
    id: String,
    name: String,
    display_name: String,
    description: String,
}

impl From<ApplicationSpace> for ApplicationSpaceItem {
    fn from(space: ApplicationSpace) -> Self {
        Self {
            customer_id: space.customer_id,
            id: space.id,
            name: space.name,
            display_name: space.display_name,
            description: space.description,
        }
    }
}

/// Lists application spaces of a customer by exact name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationSpaceListDataSource;

#[async_trait]
impl DataSource for ApplicationSpaceListDataSource {
    fn type_name(&self) -> &'static str {
        LIST_DATA_SOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        let item = Block::new()
            .with_attribute("customer_id", Attribute::computed_string())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("display_name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string());
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "customer_id",
                Attribute::required_string().with_validator(Validator::Gid),
            )
            .with_attribute("filter", filter_attribute())
            .with_block("app_spaces", NestedBlock::list(item))
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validate_filter(config)
    }

    async fn read(&self, client: &dyn ConfigClient, config: Value) -> Result<Value, ProviderError> {
        let customer_id = required_parent(&config, "customer_id")?;
        let filter = read_filter(&config)?;

        let spaces: Vec<ApplicationSpaceItem> = client
            .list_application_spaces(&customer_id)
            .await?
            .into_iter()
            .filter(|space| filter.contains(&space.name))
            .map(Into::into)
            .collect();
        debug!(customer_id = %customer_id, matched = spaces.len(), "Listed application spaces");

        Ok(json!({
            "id": list_id(&customer_id, "appSpaces", &filter),
            "customer_id": customer_id,
            "filter": filter,
            "app_spaces": spaces,
        }))
    }
}
