//! Read-only data sources.
//!
//! Single-object data sources address their object either by identifier or
//! by `name` within a parent location ([`Lookup`]). List data sources return
//! all children of a parent whose name is in `filter`.

mod application;
mod application_agent;
mod application_space;
mod customer;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ConfigClient, ReadTarget};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation::Validator;

pub use application::{ApplicationDataSource, ApplicationListDataSource};
pub use application_agent::{ApplicationAgentDataSource, ApplicationAgentListDataSource};
pub use application_space::{ApplicationSpaceDataSource, ApplicationSpaceListDataSource};
pub use customer::CustomerDataSource;

/// Read handler of one data source type.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Data source type name, for example `indykite_customer`.
    fn type_name(&self) -> &'static str;

    /// Schema of the data source.
    fn schema(&self) -> Schema;

    /// Checks beyond what the schema expresses.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Read the data source for `config`.
    async fn read(&self, client: &dyn ConfigClient, config: Value) -> Result<Value, ProviderError>;
}

/// All data sources.
pub fn all() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(CustomerDataSource),
        Box::new(ApplicationSpaceDataSource),
        Box::new(ApplicationSpaceListDataSource),
        Box::new(ApplicationDataSource),
        Box::new(ApplicationListDataSource),
        Box::new(ApplicationAgentDataSource),
        Box::new(ApplicationAgentListDataSource),
    ]
}

fn config_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Addressing of a single-object data source: either `id_key`, or `name`
/// together with `location_key`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lookup {
    pub id_key: &'static str,
    pub location_key: &'static str,
}

impl Lookup {
    pub fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let id = config_str(config, self.id_key);
        let name = config_str(config, "name");
        let location = config_str(config, self.location_key);

        let mut diagnostics = Vec::new();
        match (id, name) {
            (Some(_), Some(_)) | (None, None) => diagnostics.push(
                Diagnostic::error(format!(
                    "exactly one of `{},name` must be specified",
                    self.id_key
                ))
                .with_attribute(self.id_key),
            ),
            _ => {},
        }
        if name.is_some() && location.is_none() {
            diagnostics.push(
                Diagnostic::error(format!(
                    "\"name\": all of `name,{}` must be specified",
                    self.location_key
                ))
                .with_attribute("name"),
            );
        }
        diagnostics
    }

    pub fn target(&self, config: &Value) -> Result<ReadTarget, ProviderError> {
        match (
            config_str(config, "name"),
            config_str(config, self.location_key),
            config_str(config, self.id_key),
        ) {
            (Some(name), Some(location), _) => Ok(ReadTarget::name(name, location)),
            (None, _, Some(id)) => Ok(ReadTarget::id(id)),
            _ => Err(ProviderError::Validation(format!(
                "either `{}` or `name` with `{}` must be specified",
                self.id_key, self.location_key
            ))),
        }
    }

    /// The lookup attributes, added to `schema`.
    pub fn with_attributes(&self, schema: Schema, id_description: &str) -> Schema {
        schema
            .with_attribute(
                self.id_key,
                Attribute::optional_computed_string()
                    .with_validator(Validator::Gid)
                    .with_description(id_description),
            )
            .with_attribute(
                "name",
                Attribute::optional_computed_string().with_validator(Validator::Name),
            )
            .with_attribute(
                self.location_key,
                Attribute::optional_computed_string().with_validator(Validator::Gid),
            )
    }
}

/// The `filter` attribute of list data sources.
pub(crate) fn filter_attribute() -> Attribute {
    Attribute::required_string_list()
        .with_validator(Validator::Name)
        .with_description("Filter based on given names. Using 'exact name match' strategy.")
}

/// Names in `filter`; at least one is required.
pub(crate) fn read_filter(config: &Value) -> Result<Vec<String>, ProviderError> {
    let filter: Vec<String> = config
        .get("filter")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if filter.is_empty() {
        return Err(ProviderError::Validation(
            "Attribute filter requires 1 item minimum".to_string(),
        ));
    }
    Ok(filter)
}

pub(crate) fn validate_filter(config: &Value) -> Vec<Diagnostic> {
    match config.get("filter").and_then(Value::as_array) {
        Some(items) if items.is_empty() => vec![Diagnostic::error(
            "Attribute filter requires 1 item minimum, but config has only 0 declared",
        )
        .with_attribute("filter")],
        _ => Vec::new(),
    }
}

/// Identifier of a list data source result.
pub(crate) fn list_id(parent: &str, collection: &str, filter: &[String]) -> String {
    format!("{}/{}/{}", parent, collection, filter.join(","))
}

/// Required parent identifier of a list data source.
pub(crate) fn required_parent(config: &Value, key: &str) -> Result<String, ProviderError> {
    config_str(config, key)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Validation(format!("Missing required attribute '{}'", key)))
}
