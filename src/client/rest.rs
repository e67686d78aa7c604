//! [`ConfigClient`] over the IndyKite configuration REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::{
    ClientError, ConfigClient, Credentials, ReadTarget, RestError, APPLICATIONS_PATH,
    APPLICATION_AGENTS_PATH, APPLICATION_AGENT_CREDENTIALS_PATH, APPLICATION_SPACES_PATH,
    AUTHORIZATION_POLICIES_PATH, CURRENT_CUSTOMER_PATH,
};
use crate::generated::config::{
    Application, ApplicationAgent, ApplicationAgentCredential, ApplicationSpace,
    AuthorizationPolicy, CreateApplicationAgentCredentialRequest, CreateApplicationAgentRequest,
    CreateApplicationRequest, CreateApplicationSpaceRequest, CreateAuthorizationPolicyRequest,
    Customer, ListApplicationAgentsResponse, ListApplicationSpacesResponse,
    ListApplicationsResponse, UpdateApplicationAgentRequest, UpdateApplicationRequest,
    UpdateApplicationSpaceRequest, UpdateAuthorizationPolicyRequest,
};

/// Default timeout of a single API request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// REST client of the configuration API.
#[derive(Clone)]
pub struct RestConfigClient {
    client: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for RestConfigClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestConfigClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestConfigClient {
    /// Create a client with the default timeout.
    pub fn new(base_url: impl Into<String>, token: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from resolved service account credentials.
    pub fn from_credentials(
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Self::with_timeout(&credentials.base_url, &credentials.token, timeout)
    }

    /// Base URL every path is appended to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Option<String>, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "Sending request");

        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = response.text().await?;
        if !status.is_success() {
            warn!(method = %method, url = %url, status = status.as_u16(), "Request failed");
            return Err(RestError::new(status.as_u16(), text).into());
        }
        Ok(Some(text))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T, ClientError> {
        match self.send(method, path, body).await? {
            Some(text) if !text.trim().is_empty() => Ok(serde_json::from_str(&text)?),
            _ => Ok(serde_json::from_str("{}")?),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.call(Method::GET, path, None).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.call(Method::POST, path, Some(serde_json::to_vec(body)?))
            .await
    }

    async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.call(Method::PUT, path, Some(serde_json::to_vec(body)?))
            .await
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(Method::DELETE, path, None).await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigClient for RestConfigClient {
    #[instrument(skip(self), name = "api.read_current_customer")]
    async fn read_current_customer(&self) -> Result<Customer, ClientError> {
        self.get(CURRENT_CUSTOMER_PATH).await
    }

    #[instrument(skip_all, name = "api.create_application_space")]
    async fn create_application_space(
        &self,
        request: CreateApplicationSpaceRequest,
    ) -> Result<ApplicationSpace, ClientError> {
        self.post(APPLICATION_SPACES_PATH, &request).await
    }

    #[instrument(skip(self), name = "api.read_application_space")]
    async fn read_application_space(
        &self,
        target: ReadTarget,
    ) -> Result<ApplicationSpace, ClientError> {
        self.get(&target.path(APPLICATION_SPACES_PATH)).await
    }

    #[instrument(skip(self, request), name = "api.update_application_space")]
    async fn update_application_space(
        &self,
        id: &str,
        request: UpdateApplicationSpaceRequest,
    ) -> Result<ApplicationSpace, ClientError> {
        self.put(&format!("{}/{}", APPLICATION_SPACES_PATH, id), &request)
            .await
    }

    #[instrument(skip(self), name = "api.delete_application_space")]
    async fn delete_application_space(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("{}/{}", APPLICATION_SPACES_PATH, id))
            .await
    }

    #[instrument(skip(self), name = "api.list_application_spaces")]
    async fn list_application_spaces(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ApplicationSpace>, ClientError> {
        let response: ListApplicationSpacesResponse = self
            .get(&format!(
                "{}?organization_id={}",
                APPLICATION_SPACES_PATH, customer_id
            ))
            .await?;
        Ok(response.app_spaces)
    }

    #[instrument(skip_all, name = "api.create_application")]
    async fn create_application(
        &self,
        request: CreateApplicationRequest,
    ) -> Result<Application, ClientError> {
        self.post(APPLICATIONS_PATH, &request).await
    }

    #[instrument(skip(self), name = "api.read_application")]
    async fn read_application(&self, target: ReadTarget) -> Result<Application, ClientError> {
        self.get(&target.path(APPLICATIONS_PATH)).await
    }

    #[instrument(skip(self, request), name = "api.update_application")]
    async fn update_application(
        &self,
        id: &str,
        request: UpdateApplicationRequest,
    ) -> Result<Application, ClientError> {
        self.put(&format!("{}/{}", APPLICATIONS_PATH, id), &request)
            .await
    }

    #[instrument(skip(self), name = "api.delete_application")]
    async fn delete_application(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("{}/{}", APPLICATIONS_PATH, id)).await
    }

    #[instrument(skip(self), name = "api.list_applications")]
    async fn list_applications(
        &self,
        app_space_id: &str,
    ) -> Result<Vec<Application>, ClientError> {
        let response: ListApplicationsResponse = self
            .get(&format!("{}?project_id={}", APPLICATIONS_PATH, app_space_id))
            .await?;
        Ok(response.applications)
    }

    #[instrument(skip_all, name = "api.create_application_agent")]
    async fn create_application_agent(
        &self,
        request: CreateApplicationAgentRequest,
    ) -> Result<ApplicationAgent, ClientError> {
        self.post(APPLICATION_AGENTS_PATH, &request).await
    }

    #[instrument(skip(self), name = "api.read_application_agent")]
    async fn read_application_agent(
        &self,
        target: ReadTarget,
    ) -> Result<ApplicationAgent, ClientError> {
        self.get(&target.path(APPLICATION_AGENTS_PATH)).await
    }

    #[instrument(skip(self, request), name = "api.update_application_agent")]
    async fn update_application_agent(
        &self,
        id: &str,
        request: UpdateApplicationAgentRequest,
    ) -> Result<ApplicationAgent, ClientError> {
        self.put(&format!("{}/{}", APPLICATION_AGENTS_PATH, id), &request)
            .await
    }

    #[instrument(skip(self), name = "api.delete_application_agent")]
    async fn delete_application_agent(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("{}/{}", APPLICATION_AGENTS_PATH, id))
            .await
    }

    #[instrument(skip(self), name = "api.list_application_agents")]
    async fn list_application_agents(
        &self,
        app_space_id: &str,
    ) -> Result<Vec<ApplicationAgent>, ClientError> {
        let response: ListApplicationAgentsResponse = self
            .get(&format!(
                "{}?project_id={}",
                APPLICATION_AGENTS_PATH, app_space_id
            ))
            .await?;
        Ok(response.agents)
    }

    #[instrument(skip_all, name = "api.create_application_agent_credential")]
    async fn create_application_agent_credential(
        &self,
        request: CreateApplicationAgentCredentialRequest,
    ) -> Result<ApplicationAgentCredential, ClientError> {
        self.post(APPLICATION_AGENT_CREDENTIALS_PATH, &request)
            .await
    }

    #[instrument(skip(self), name = "api.read_application_agent_credential")]
    async fn read_application_agent_credential(
        &self,
        id: &str,
    ) -> Result<ApplicationAgentCredential, ClientError> {
        self.get(&format!("{}/{}", APPLICATION_AGENT_CREDENTIALS_PATH, id))
            .await
    }

    #[instrument(skip(self), name = "api.delete_application_agent_credential")]
    async fn delete_application_agent_credential(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("{}/{}", APPLICATION_AGENT_CREDENTIALS_PATH, id))
            .await
    }

    #[instrument(skip_all, name = "api.create_authorization_policy")]
    async fn create_authorization_policy(
        &self,
        request: CreateAuthorizationPolicyRequest,
    ) -> Result<AuthorizationPolicy, ClientError> {
        self.post(AUTHORIZATION_POLICIES_PATH, &request).await
    }

    #[instrument(skip(self), name = "api.read_authorization_policy")]
    async fn read_authorization_policy(
        &self,
        target: ReadTarget,
    ) -> Result<AuthorizationPolicy, ClientError> {
        self.get(&target.path(AUTHORIZATION_POLICIES_PATH)).await
    }

    #[instrument(skip(self, request), name = "api.update_authorization_policy")]
    async fn update_authorization_policy(
        &self,
        id: &str,
        request: UpdateAuthorizationPolicyRequest,
    ) -> Result<AuthorizationPolicy, ClientError> {
        self.put(&format!("{}/{}", AUTHORIZATION_POLICIES_PATH, id), &request)
            .await
    }

    #[instrument(skip(self), name = "api.delete_authorization_policy")]
    async fn delete_authorization_policy(&self, id: &str) -> Result<(), ClientError> {
        self.delete(&format!("{}/{}", AUTHORIZATION_POLICIES_PATH, id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = RestConfigClient::new("https://api.example.com/configs/v1/", "token").unwrap();
        assert_eq!(client.base_url(), "https://api.example.com/configs/v1");
    }

    #[test]
    fn test_invalid_token_rejected() {
        let err = RestConfigClient::new("https://api.example.com", "bad\ntoken").unwrap_err();
        assert!(matches!(err, ClientError::InvalidToken(_)));
    }

    #[test]
    fn test_debug_hides_token() {
        let client = RestConfigClient::new("https://api.example.com", "secret").unwrap();
        assert!(!format!("{:?}", client).contains("secret"));
    }
}
