//! The IndyKite provider: routes protocol operations to resources and data
//! sources and owns the configured API client.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::{ConfigClient, Credentials, RestConfigClient, DEFAULT_TIMEOUT};
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::plan;
use crate::resources::{self, parse_state, Resource};
use crate::schema::{Attribute, Diagnostic, ProviderSchema, Schema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderConfig {
    credentials_json: String,
    credentials_file: String,
    base_url: String,
    request_timeout: Option<i64>,
}

impl ProviderConfig {
    fn credentials(&self) -> Result<Credentials, ProviderError> {
        let credentials = if !self.credentials_json.is_empty() {
            Credentials::from_json(&self.credentials_json)
        } else if !self.credentials_file.is_empty() {
            Credentials::from_file(&self.credentials_file)
        } else {
            Credentials::from_env()
        };
        let mut credentials =
            credentials.map_err(|e| ProviderError::Configuration(e.to_string()))?;
        if !self.base_url.is_empty() {
            credentials.base_url = self.base_url.trim_end_matches('/').to_string();
        }
        Ok(credentials)
    }

    fn timeout(&self) -> Duration {
        match self.request_timeout {
            Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
            _ => DEFAULT_TIMEOUT,
        }
    }
}

/// Provider of IndyKite configuration objects.
///
/// Every resource and data source operation needs a configured API client,
/// installed either by [`ProviderService::configure`] or up front with
/// [`IndykiteProvider::with_client`].
pub struct IndykiteProvider {
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
    client: RwLock<Option<Arc<dyn ConfigClient>>>,
}

impl Default for IndykiteProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IndykiteProvider {
    /// Create an unconfigured provider.
    pub fn new() -> Self {
        Self {
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: data_sources::all()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            client: RwLock::new(None),
        }
    }

    /// Create a provider that talks through `client` without configuring.
    pub fn with_client(client: Arc<dyn ConfigClient>) -> Self {
        let provider = Self::new();
        Self {
            client: RwLock::new(Some(client)),
            ..provider
        }
    }

    /// Replace the registered resources, for example to shorten waits.
    pub fn with_resource(mut self, resource: Box<dyn Resource>) -> Self {
        self.resources.insert(resource.type_name(), resource);
        self
    }

    fn provider_config_schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "credentials_json",
                Attribute::optional_string()
                    .sensitive()
                    .with_conflict("credentials_file")
                    .with_description("Service account credentials as JSON. Falls back to INDYKITE_SERVICE_ACCOUNT_CREDENTIALS."),
            )
            .with_attribute(
                "credentials_file",
                Attribute::optional_string()
                    .with_description("Path to a service account credentials file. Falls back to INDYKITE_SERVICE_ACCOUNT_CREDENTIALS_FILE."),
            )
            .with_attribute(
                "base_url",
                Attribute::optional_string()
                    .with_description("Overrides the API base URL derived from the credentials."),
            )
            .with_attribute(
                "request_timeout",
                Attribute::optional_int64()
                    .with_description("Timeout of a single API request in seconds. Defaults to 120."),
            )
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(resource_type)
            .map(Box::as_ref)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(Box::as_ref)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }

    async fn client(&self) -> Result<Arc<dyn ConfigClient>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "provider is not configured, Configure must be called first".to_string(),
            )
        })
    }
}

#[async_trait::async_trait]
impl ProviderService for IndykiteProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(Self::provider_config_schema());
        for (name, resource) in &self.resources {
            schema = schema.with_resource(*name, resource.schema());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(*name, data_source.schema());
        }
        schema
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.resources.keys().map(|name| name.to_string()).collect(),
            data_sources: self.data_sources.keys().map(|name| name.to_string()).collect(),
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validation::validate(&Self::provider_config_schema(), &config);
        if let Some(timeout) = config.get("request_timeout").and_then(Value::as_i64) {
            if timeout <= 0 {
                diagnostics.push(
                    Diagnostic::error("request_timeout must be a positive number of seconds")
                        .with_attribute("request_timeout"),
                );
            }
        }
        Ok(diagnostics)
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config: ProviderConfig = parse_state(config)?;
        let credentials = config.credentials()?;
        let client = RestConfigClient::from_credentials(&credentials, config.timeout())
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        info!(base_url = %client.base_url(), "Provider configured");

        *self.client.write().await = Some(Arc::new(client));
        Ok(vec![])
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        Ok(validation::validate(&resource.schema(), &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        if proposed_state.is_null() {
            debug!(resource_type, "Planning destroy");
            return Ok(plan::destroy(&prior_state.unwrap_or(Value::Null)));
        }
        Ok(plan::diff(&resource.schema(), prior_state.as_ref(), &proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.create(client.as_ref(), planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.read(client.as_ref(), current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.update(client.as_ref(), prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.delete(client.as_ref(), current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.resource(resource_type)?.import(id)
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let mut diagnostics = validation::validate(&data_source.schema(), &config);
        diagnostics.extend(data_source.validate(&config));
        Ok(diagnostics)
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;
        data_source.read(client.as_ref(), config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockConfigClient;
    use crate::client::ReadTarget;
    use crate::generated::config::{Application, ApplicationSpace};
    use crate::resources::fixtures::*;
    use crate::resources::{ApplicationSpaceResource, WaitSchedule, IKG_STATUS_ACTIVE};
    use mockall::predicate;
    use serde_json::json;

    fn provider(client: MockConfigClient) -> IndykiteProvider {
        IndykiteProvider::with_client(Arc::new(client))
    }

    #[test]
    fn test_schema_registers_everything() {
        let provider = IndykiteProvider::new();
        let metadata = provider.metadata();
        assert_eq!(
            metadata.resources,
            vec![
                "indykite_application",
                "indykite_application_agent",
                "indykite_application_agent_credential",
                "indykite_application_space",
                "indykite_authorization_policy",
            ]
        );
        assert_eq!(metadata.data_sources.len(), 7);
        assert!(provider
            .schema()
            .provider
            .block
            .attributes["credentials_json"]
            .sensitive);
        assert!(metadata.capabilities.plan_destroy);
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let provider = IndykiteProvider::new();
        let err = provider
            .read("indykite_application", json!({"id": APPLICATION_ID}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let provider = provider(MockConfigClient::new());
        let err = provider
            .create("indykite_tenant", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_configure_with_token() {
        let provider = IndykiteProvider::new();
        provider
            .configure(json!({
                "credentials_json": r#"{"token": "abc", "baseUrl": "http://localhost:8080"}"#,
                "request_timeout": 5,
            }))
            .await
            .unwrap();
        assert!(provider.client().await.is_ok());
    }

    #[tokio::test]
    async fn test_configure_with_missing_file() {
        let provider = IndykiteProvider::new();
        let err = provider
            .configure(json!({"credentials_file": "/nonexistent/credentials.json"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_validate_provider_config() {
        let provider = IndykiteProvider::new();
        let diagnostics = provider
            .validate_provider_config(json!({"request_timeout": 0}))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("request_timeout"));
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let provider = provider(MockConfigClient::new());
        let diagnostics = provider
            .validate_resource_config(
                "indykite_application",
                json!({"app_space_id": APP_SPACE_ID, "name": "Invalid Name"}),
            )
            .await
            .unwrap();
        assert!(diagnostics.iter().any(|d| d.attribute.as_deref() == Some("name")));
    }

    #[tokio::test]
    async fn test_plan_create_and_destroy() {
        let provider = provider(MockConfigClient::new());
        let plan = provider
            .plan(
                "indykite_application",
                None,
                json!({"app_space_id": APP_SPACE_ID, "name": "acme-app"}),
                json!({}),
            )
            .await
            .unwrap();
        assert!(plan.has_changes());
        assert_eq!(plan.planned_state["deletion_protection"], true);

        let plan = provider
            .plan(
                "indykite_application",
                Some(json!({"id": APPLICATION_ID})),
                Value::Null,
                json!({}),
            )
            .await
            .unwrap();
        assert_eq!(plan.planned_state, Value::Null);
        assert_eq!(plan.changed_paths(), vec!["id"]);
    }

    #[tokio::test]
    async fn test_read_delegates_to_resource() {
        let mut client = MockConfigClient::new();
        client
            .expect_read_application()
            .with(predicate::eq(ReadTarget::id(APPLICATION_ID)))
            .times(1)
            .returning(|_| {
                Ok(Application {
                    id: APPLICATION_ID.to_string(),
                    name: "acme-app".to_string(),
                    ..Default::default()
                })
            });

        let state = provider(client)
            .read("indykite_application", json!({"id": APPLICATION_ID}))
            .await
            .unwrap();
        assert_eq!(state["name"], "acme-app");
        assert_eq!(state["deletion_protection"], true);
    }

    #[tokio::test]
    async fn test_with_resource_replaces_registration() {
        let mut client = MockConfigClient::new();
        client.expect_create_application_space().times(1).returning(|_| {
            Ok(ApplicationSpace {
                id: APP_SPACE_ID.to_string(),
                ..Default::default()
            })
        });
        client.expect_read_application_space().times(1).returning(|_| {
            Ok(ApplicationSpace {
                id: APP_SPACE_ID.to_string(),
                name: "acme".to_string(),
                ikg_status: IKG_STATUS_ACTIVE.to_string(),
                ..Default::default()
            })
        });

        let provider = provider(client).with_resource(Box::new(
            ApplicationSpaceResource::with_schedule(WaitSchedule {
                initial: vec![],
                interval: Duration::ZERO,
                max_wait: Duration::from_secs(1),
            }),
        ));
        let state = provider
            .create(
                "indykite_application_space",
                json!({"customer_id": CUSTOMER_ID, "name": "acme", "region": "us-east1"}),
            )
            .await
            .unwrap();
        assert_eq!(state["id"], APP_SPACE_ID);
        assert_eq!(state["ikg_status"], IKG_STATUS_ACTIVE);
    }

    #[tokio::test]
    async fn test_delete_protection() {
        let provider = provider(MockConfigClient::new());
        let err = provider
            .delete(
                "indykite_application",
                json!({"id": APPLICATION_ID, "deletion_protection": true}),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Delete Protection is enabled"));
    }

    #[tokio::test]
    async fn test_import() {
        let provider = IndykiteProvider::new();
        let imported = provider
            .import_resource("indykite_application", APPLICATION_ID)
            .await
            .unwrap();
        assert_eq!(imported[0].state, json!({"id": APPLICATION_ID}));

        let err = provider
            .import_resource("indykite_application", "acme-app")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unimplemented id format"));
    }

    #[tokio::test]
    async fn test_validate_data_source_config() {
        let provider = IndykiteProvider::new();
        let diagnostics = provider
            .validate_data_source_config("indykite_application_space", json!({}))
            .await
            .unwrap();
        assert!(diagnostics
            .iter()
            .any(|d| d.summary.contains("exactly one of `app_space_id,name`")));
    }
}
