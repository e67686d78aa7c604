//! Client for the IndyKite configuration REST API.
//!
//! Resources talk to the API through the [`ConfigClient`] trait so tests can
//! substitute a mock. [`RestConfigClient`] is the real implementation.

pub mod credentials;
mod error;
#[cfg(test)]
pub(crate) mod mock;
mod rest;

use async_trait::async_trait;

use crate::generated::config::{
    Application, ApplicationAgent, ApplicationAgentCredential, ApplicationSpace,
    AuthorizationPolicy, CreateApplicationAgentCredentialRequest, CreateApplicationAgentRequest,
    CreateApplicationRequest, CreateApplicationSpaceRequest, CreateAuthorizationPolicyRequest,
    Customer, UpdateApplicationAgentRequest, UpdateApplicationRequest,
    UpdateApplicationSpaceRequest, UpdateAuthorizationPolicyRequest,
};

pub use credentials::{Credentials, CredentialsError};
pub use error::{ClientError, RestError};
pub use rest::{RestConfigClient, DEFAULT_TIMEOUT};

/// Collection path of application spaces.
pub const APPLICATION_SPACES_PATH: &str = "/projects";
/// Collection path of applications.
pub const APPLICATIONS_PATH: &str = "/applications";
/// Collection path of application agents.
pub const APPLICATION_AGENTS_PATH: &str = "/application-agents";
/// Collection path of application agent credentials.
pub const APPLICATION_AGENT_CREDENTIALS_PATH: &str = "/application-agent-credentials";
/// Collection path of authorization policies.
pub const AUTHORIZATION_POLICIES_PATH: &str = "/authorization-policies";
/// Path of the organization the credentials belong to.
pub const CURRENT_CUSTOMER_PATH: &str = "/organizations/current";

const LOCATION_MARKER: &str = "?location=";

/// How an object is addressed when reading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadTarget {
    /// Address by `gid:` identifier.
    Id(String),
    /// Address by name within a parent location.
    Name {
        /// Object name.
        name: String,
        /// Identifier of the parent (customer or application space).
        location: String,
    },
}

impl ReadTarget {
    /// Address an object by its identifier.
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Address an object by name within a parent.
    pub fn name(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self::Name {
            name: name.into(),
            location: location.into(),
        }
    }

    /// Interpret a state identifier, which is either `gid:...` or
    /// `name?location=gid:...` after an import by name.
    pub fn from_state_id(id: &str) -> Self {
        match id.split_once(LOCATION_MARKER) {
            Some((name, location)) => Self::name(name, location),
            None => Self::id(id),
        }
    }

    /// Build the request path below `collection`.
    ///
    /// Name lookups translate the location into the query parameter the API
    /// expects: `organization_id` for application spaces, `project_id` for
    /// everything living inside an application space.
    pub fn path(&self, collection: &str) -> String {
        match self {
            Self::Id(id) => format!("{}/{}", collection, id),
            Self::Name { name, location } => {
                let param = if collection == APPLICATION_SPACES_PATH {
                    "organization_id"
                } else {
                    "project_id"
                };
                format!("{}/{}?{}={}", collection, name, param, location)
            },
        }
    }
}

impl std::fmt::Display for ReadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Name { name, location } => write!(f, "{}{}{}", name, LOCATION_MARKER, location),
        }
    }
}

/// Operations of the configuration API used by the provider.
#[async_trait]
pub trait ConfigClient: Send + Sync {
    /// Read the organization the credentials belong to.
    async fn read_current_customer(&self) -> Result<Customer, ClientError>;

    /// Create an application space.
    async fn create_application_space(
        &self,
        request: CreateApplicationSpaceRequest,
    ) -> Result<ApplicationSpace, ClientError>;

    /// Read an application space.
    async fn read_application_space(
        &self,
        target: ReadTarget,
    ) -> Result<ApplicationSpace, ClientError>;

    /// Update an application space.
    async fn update_application_space(
        &self,
        id: &str,
        request: UpdateApplicationSpaceRequest,
    ) -> Result<ApplicationSpace, ClientError>;

    /// Delete an application space.
    async fn delete_application_space(&self, id: &str) -> Result<(), ClientError>;

    /// List application spaces of a customer.
    async fn list_application_spaces(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ApplicationSpace>, ClientError>;

    /// Create an application.
    async fn create_application(
        &self,
        request: CreateApplicationRequest,
    ) -> Result<Application, ClientError>;

    /// Read an application.
    async fn read_application(&self, target: ReadTarget) -> Result<Application, ClientError>;

    /// Update an application.
    async fn update_application(
        &self,
        id: &str,
        request: UpdateApplicationRequest,
    ) -> Result<Application, ClientError>;

    /// Delete an application.
    async fn delete_application(&self, id: &str) -> Result<(), ClientError>;

    /// List applications of an application space.
    async fn list_applications(&self, app_space_id: &str)
        -> Result<Vec<Application>, ClientError>;

    /// Create an application agent.
    async fn create_application_agent(
        &self,
        request: CreateApplicationAgentRequest,
    ) -> Result<ApplicationAgent, ClientError>;

    /// Read an application agent.
    async fn read_application_agent(
        &self,
        target: ReadTarget,
    ) -> Result<ApplicationAgent, ClientError>;

    /// Update an application agent.
    async fn update_application_agent(
        &self,
        id: &str,
        request: UpdateApplicationAgentRequest,
    ) -> Result<ApplicationAgent, ClientError>;

    /// Delete an application agent.
    async fn delete_application_agent(&self, id: &str) -> Result<(), ClientError>;

    /// List application agents of an application space.
    async fn list_application_agents(
        &self,
        app_space_id: &str,
    ) -> Result<Vec<ApplicationAgent>, ClientError>;

    /// Register a public key for an application agent.
    async fn create_application_agent_credential(
        &self,
        request: CreateApplicationAgentCredentialRequest,
    ) -> Result<ApplicationAgentCredential, ClientError>;

    /// Read an application agent credential.
    async fn read_application_agent_credential(
        &self,
        id: &str,
    ) -> Result<ApplicationAgentCredential, ClientError>;

    /// Revoke an application agent credential.
    async fn delete_application_agent_credential(&self, id: &str) -> Result<(), ClientError>;

    /// Create an authorization policy.
    async fn create_authorization_policy(
        &self,
        request: CreateAuthorizationPolicyRequest,
    ) -> Result<AuthorizationPolicy, ClientError>;

    /// Read an authorization policy.
    async fn read_authorization_policy(
        &self,
        target: ReadTarget,
    ) -> Result<AuthorizationPolicy, ClientError>;

    /// Update an authorization policy.
    async fn update_authorization_policy(
        &self,
        id: &str,
        request: UpdateAuthorizationPolicyRequest,
    ) -> Result<AuthorizationPolicy, ClientError>;

    /// Delete an authorization policy.
    async fn delete_authorization_policy(&self, id: &str) -> Result<(), ClientError>;
}
