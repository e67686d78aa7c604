//! `indykite_application_agent_credential` resource.
//!
//! Credentials are immutable. The only updatable attribute is
//! `default_tenant_id`, which the API embeds in the generated agent
//! configuration and which is rewritten locally.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{
    computed_id_attribute, create_time_attribute, import_by_id, parent_id_attribute, parse_state,
    to_state, Resource,
};
use crate::client::ConfigClient;
use crate::error::ProviderError;
use crate::generated::config::{ApplicationAgentCredential, CreateApplicationAgentCredentialRequest};
use crate::schema::{Attribute, DiffSuppress, Schema};
use crate::types::ImportedResource;
use crate::validation::Validator;

/// Resource type name.
pub const RESOURCE_TYPE: &str = "indykite_application_agent_credential";

const DEFAULT_TENANT_KEY: &str = "default_tenant_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct CredentialState {
    id: String,
    customer_id: String,
    app_space_id: String,
    application_id: String,
    app_agent_id: String,
    display_name: String,
    public_key_pem: String,
    public_key_jwk: String,
    expire_time: String,
    default_tenant_id: String,
    kid: String,
    agent_config: String,
    create_time: String,
}

impl CredentialState {
    /// Copy the attributes the API reports, keeping the configured ones.
    fn refresh(&mut self, credential: ApplicationAgentCredential) {
        self.id = credential.id;
        self.customer_id = credential.customer_id;
        self.app_space_id = credential.app_space_id;
        self.application_id = credential.application_id;
        self.app_agent_id = credential.application_agent_id;
        self.display_name = credential.display_name;
        self.kid = credential.kid;
        self.create_time = credential.create_time;
    }
}

fn rewrite_default_tenant(agent_config: &str, tenant_id: &str) -> Result<String, ProviderError> {
    let mut config: serde_json::Map<String, Value> = serde_json::from_str(agent_config)
        .map_err(|e| ProviderError::Internal(format!("agent_config: {}", e)))?;
    config.insert(
        "defaultTenantId".to_string(),
        Value::String(tenant_id.to_string()),
    );
    Ok(serde_json::to_string(&config)?)
}

/// Key pairs an application agent authenticates with.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationAgentCredentialResource;

#[async_trait]
impl Resource for ApplicationAgentCredentialResource {
    fn type_name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", computed_id_attribute("Identifier of the credential."))
            .with_attribute("customer_id", computed_id_attribute("Identifier of the customer."))
            .with_attribute(
                "app_space_id",
                computed_id_attribute("Identifier of the application space."),
            )
            .with_attribute(
                "application_id",
                computed_id_attribute("Identifier of the application."),
            )
            .with_attribute(
                "app_agent_id",
                parent_id_attribute("Identifier of the application agent the credential is issued for."),
            )
            .with_attribute(
                "display_name",
                Attribute::optional_string()
                    .with_force_new()
                    .with_diff_suppress(DiffSuppress::DisplayName { fallback: "kid" }),
            )
            .with_attribute(
                "public_key_pem",
                Attribute::optional_string()
                    .with_force_new()
                    .with_conflict("public_key_jwk")
                    .with_validator(Validator::PublicKeyPem)
                    .with_validator(Validator::LengthBetween(256, 8192))
                    .with_description("Provide your own public key in PEM format, otherwise a new pair is generated."),
            )
            .with_attribute(
                "public_key_jwk",
                Attribute::optional_string()
                    .with_force_new()
                    .with_conflict("public_key_pem")
                    .with_diff_suppress(DiffSuppress::Json)
                    .with_validator(Validator::Json)
                    .with_validator(Validator::LengthBetween(96, 8192))
                    .with_description("Provide your own public key in JWK format, otherwise a new pair is generated."),
            )
            .with_attribute(
                "expire_time",
                Attribute::optional_string()
                    .with_force_new()
                    .with_validator(Validator::Rfc3339)
                    .with_description("Optional date-time when the credential expires."),
            )
            .with_attribute(
                DEFAULT_TENANT_KEY,
                Attribute::optional_string()
                    .with_validator(Validator::Gid)
                    .with_description("Default tenant ID, only returned in the generated agent_config."),
            )
            .with_attribute("kid", Attribute::computed_string())
            .with_attribute("agent_config", Attribute::computed_string().sensitive())
            .with_attribute("create_time", create_time_attribute())
    }

    async fn create(
        &self,
        client: &dyn ConfigClient,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let mut state: CredentialState = parse_state(planned)?;

        let mut request = CreateApplicationAgentCredentialRequest {
            application_agent_id: state.app_agent_id.clone(),
            display_name: state.display_name.clone(),
            expire_time: state.expire_time.clone(),
            default_tenant_id: state.default_tenant_id.clone(),
            ..Default::default()
        };
        if !state.public_key_pem.is_empty() {
            request.public_key_pem = state.public_key_pem.trim().to_string();
        } else if !state.public_key_jwk.is_empty() {
            request.public_key_jwk = state.public_key_jwk.trim().to_string();
        }

        let created = client.create_application_agent_credential(request).await?;
        info!(id = %created.id, app_agent_id = %state.app_agent_id, "Application agent credential registered");
        state.agent_config = created.agent_config;

        let credential = client.read_application_agent_credential(&created.id).await?;
        state.refresh(credential);
        to_state(&state)
    }

    async fn read(&self, client: &dyn ConfigClient, state: Value) -> Result<Value, ProviderError> {
        let mut state: CredentialState = parse_state(state)?;
        let credential = client.read_application_agent_credential(&state.id).await?;
        state.refresh(credential);
        to_state(&state)
    }

    async fn update(
        &self,
        _client: &dyn ConfigClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: CredentialState = parse_state(prior)?;
        let mut planned: CredentialState = parse_state(planned)?;

        let mut unchanged = planned.clone();
        unchanged.default_tenant_id = prior.default_tenant_id.clone();
        if unchanged != prior {
            return Err(ProviderError::Internal(format!(
                "All fields except '{}' must be set to forceNew:true.",
                DEFAULT_TENANT_KEY
            )));
        }

        if !planned.agent_config.is_empty() {
            planned.agent_config =
                rewrite_default_tenant(&planned.agent_config, &planned.default_tenant_id)?;
        }
        to_state(&planned)
    }

    async fn delete(&self, client: &dyn ConfigClient, state: Value) -> Result<(), ProviderError> {
        let state: CredentialState = parse_state(state)?;
        client.delete_application_agent_credential(&state.id).await?;
        info!(id = %state.id, "Application agent credential deleted");
        Ok(())
    }

    fn import(&self, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        // Credentials have no name, so only identifiers can be imported.
        if id.contains("?location=") {
            return Err(ProviderError::Validation(format!(
                "Unimplemented id format: {}. Expected 'gid:xxx'",
                id
            )));
        }
        import_by_id(RESOURCE_TYPE, id)
    }
}
