//! Mock [`ConfigClient`] for resource and data source tests.

use async_trait::async_trait;
use mockall::mock;

use super::{ClientError, ConfigClient, ReadTarget};
use crate::generated::config::{
    Application, ApplicationAgent, ApplicationAgentCredential, ApplicationSpace,
    AuthorizationPolicy, CreateApplicationAgentCredentialRequest, CreateApplicationAgentRequest,
    CreateApplicationRequest, CreateApplicationSpaceRequest, CreateAuthorizationPolicyRequest,
    Customer, UpdateApplicationAgentRequest, UpdateApplicationRequest,
    UpdateApplicationSpaceRequest, UpdateAuthorizationPolicyRequest,
};

mock! {
    pub ConfigClient {}

    #[async_trait]
    impl ConfigClient for ConfigClient {
        async fn read_current_customer(&self) -> Result<Customer, ClientError>;

        async fn create_application_space(
            &self,
            request: CreateApplicationSpaceRequest,
        ) -> Result<ApplicationSpace, ClientError>;

        async fn read_application_space(
            &self,
            target: ReadTarget,
        ) -> Result<ApplicationSpace, ClientError>;

        async fn update_application_space(
            &self,
            id: &str,
            request: UpdateApplicationSpaceRequest,
        ) -> Result<ApplicationSpace, ClientError>;

        async fn delete_application_space(&self, id: &str) -> Result<(), ClientError>;

        async fn list_application_spaces(
            &self,
            customer_id: &str,
        ) -> Result<Vec<ApplicationSpace>, ClientError>;

        async fn create_application(
            &self,
            request: CreateApplicationRequest,
        ) -> Result<Application, ClientError>;

        async fn read_application(&self, target: ReadTarget) -> Result<Application, ClientError>;

        async fn update_application(
            &self,
            id: &str,
            request: UpdateApplicationRequest,
        ) -> Result<Application, ClientError>;

        async fn delete_application(&self, id: &str) -> Result<(), ClientError>;

        async fn list_applications(
            &self,
            app_space_id: &str,
        ) -> Result<Vec<Application>, ClientError>;

        async fn create_application_agent(
            &self,
            request: CreateApplicationAgentRequest,
        ) -> Result<ApplicationAgent, ClientError>;

        async fn read_application_agent(
            &self,
            target: ReadTarget,
        ) -> Result<ApplicationAgent, ClientError>;

        async fn update_application_agent(
            &self,
            id: &str,
            request: UpdateApplicationAgentRequest,
        ) -> Result<ApplicationAgent, ClientError>;

        async fn delete_application_agent(&self, id: &str) -> Result<(), ClientError>;

        async fn list_application_agents(
            &self,
            app_space_id: &str,
        ) -> Result<Vec<ApplicationAgent>, ClientError>;

        async fn create_application_agent_credential(
            &self,
            request: CreateApplicationAgentCredentialRequest,
        ) -> Result<ApplicationAgentCredential, ClientError>;

        async fn read_application_agent_credential(
            &self,
            id: &str,
        ) -> Result<ApplicationAgentCredential, ClientError>;

        async fn delete_application_agent_credential(
            &self,
            id: &str,
        ) -> Result<(), ClientError>;

        async fn create_authorization_policy(
            &self,
            request: CreateAuthorizationPolicyRequest,
        ) -> Result<AuthorizationPolicy, ClientError>;

        async fn read_authorization_policy(
            &self,
            target: ReadTarget,
        ) -> Result<AuthorizationPolicy, ClientError>;

        async fn update_authorization_policy(
            &self,
            id: &str,
            request: UpdateAuthorizationPolicyRequest,
        ) -> Result<AuthorizationPolicy, ClientError>;

        async fn delete_authorization_policy(&self, id: &str) -> Result<(), ClientError>;
    }
}
