//! `indykite_customer` data source.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{config_str, DataSource};
use crate::client::ConfigClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::validation::Validator;

/// Data source type name.
pub const DATA_SOURCE_TYPE: &str = "indykite_customer";

/// The organization the credentials belong to.
///
/// The API only exposes the current organization, so `customer_id` and
/// `name` are checked against it rather than used for a lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerDataSource;

#[async_trait]
impl DataSource for CustomerDataSource {
    fn type_name(&self) -> &'static str {
        DATA_SOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("It is your entire workspace in the IndyKite platform, and will represent your specific company or organization.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "customer_id",
                Attribute::optional_computed_string()
                    .with_validator(Validator::Gid)
                    .with_description("Identifier of the customer."),
            )
            .with_attribute(
                "name",
                Attribute::optional_computed_string().with_validator(Validator::Name),
            )
            .with_attribute("display_name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("create_time", Attribute::computed_string())
            .with_attribute("update_time", Attribute::computed_string())
    }

    async fn read(&self, client: &dyn ConfigClient, config: Value) -> Result<Value, ProviderError> {
        let customer = client.read_current_customer().await?;

        if let Some(id) = config_str(&config, "customer_id") {
            if id != customer.id {
                return Err(ProviderError::NotFound(format!(
                    "customer with ID '{}' not found (current organization ID is '{}')",
                    id, customer.id
                )));
            }
        }
        if let Some(name) = config_str(&config, "name") {
            if name != customer.name {
                return Err(ProviderError::NotFound(format!(
                    "customer with name '{}' not found (current organization is '{}')",
                    name, customer.name
                )));
            }
        }

        Ok(json!({
            "id": customer.id,
            "customer_id": customer.id,
            "name": customer.name,
            "display_name": customer.display_name,
            "description": customer.description,
            "create_time": customer.create_time,
            "update_time": customer.update_time,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockConfigClient;
    use crate::generated::config::Customer;
    use crate::resources::fixtures::*;

    fn client() -> MockConfigClient {
        let mut client = MockConfigClient::new();
        client.expect_read_current_customer().times(1).returning(|| {
            Ok(Customer {
                id: CUSTOMER_ID.to_string(),
                name: "acme".to_string(),
                display_name: "Acme Inc.".to_string(),
                create_time: CREATE_TIME.to_string(),
                ..Default::default()
            })
        });
        client
    }

    #[tokio::test]
    async fn test_read_current() {
        let state = CustomerDataSource.read(&client(), json!({})).await.unwrap();
        assert_eq!(state["id"], CUSTOMER_ID);
        assert_eq!(state["customer_id"], CUSTOMER_ID);
        assert_eq!(state["display_name"], "Acme Inc.");
        assert_eq!(state["description"], "");
    }

    #[tokio::test]
    async fn test_matching_filters() {
        let state = CustomerDataSource
            .read(&client(), json!({"customer_id": CUSTOMER_ID, "name": "acme"}))
            .await
            .unwrap();
        assert_eq!(state["name"], "acme");
    }

    #[tokio::test]
    async fn test_mismatching_id() {
        let err = CustomerDataSource
            .read(&client(), json!({"customer_id": TENANT_ID}))
            .await
            .unwrap_err();
        assert_eq!(
            err.message(),
            format!(
                "customer with ID '{}' not found (current organization ID is '{}')",
                TENANT_ID, CUSTOMER_ID
            )
        );
    }

    #[tokio::test]
    async fn test_mismatching_name() {
        let err = CustomerDataSource
            .read(&client(), json!({"name": "other"}))
            .await
            .unwrap_err();
        assert_eq!(
            err.message(),
            "customer with name 'other' not found (current organization is 'acme')"
        );
    }
}
