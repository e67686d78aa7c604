//! Test harness for driving a [`ProviderService`] without a gRPC server.
//!
//! ```ignore
//! use std::sync::Arc;
//! use indykite_provider::testing::{assert_plan_creates, ProviderTester};
//! use indykite_provider::IndykiteProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_application() {
//!     let tester = ProviderTester::new(IndykiteProvider::with_client(Arc::new(client)));
//!     let plan = tester
//!         .plan_create("indykite_application", json!({
//!             "app_space_id": "gid:AAAAAmluZHlraURlgAABDwAAAAA",
//!             "name": "acme-app",
//!         }))
//!         .await
//!         .unwrap();
//!     assert_plan_creates(&plan);
//! }
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Failure of a harness call that reports diagnostics.
#[derive(Debug, Error)]
pub enum TestError {
    /// The provider answered with error diagnostics.
    #[error("operation failed with {} diagnostic(s):\n{}", .0.len(), render(.0))]
    Diagnostics(Vec<Diagnostic>),

    /// The provider returned an error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let mut line = format!("  [{:?}] {}", d.severity, d.summary);
            if let Some(detail) = &d.detail {
                line.push_str(&format!(": {}", detail));
            }
            if let Some(attribute) = &d.attribute {
                line.push_str(&format!(" (at {})", attribute));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn errors_only(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<Diagnostic> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Calls a provider the way the host runtime would.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Sorted resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Sorted data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate and apply the provider configuration.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        errors_only(self.provider.validate_provider_config(config.clone()).await?)?;
        errors_only(self.provider.configure(config).await?)
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        errors_only(
            self.provider
                .validate_resource_config(resource_type, config)
                .await?,
        )
    }

    /// Plan a create.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan an update of `prior` towards `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), config.clone(), config)
            .await
    }

    /// Plan the destruction of `prior`.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), Value::Null, Value::Null)
            .await
    }

    /// Create a resource from a planned state.
    pub async fn create(&self, resource_type: &str, planned: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned).await
    }

    /// Refresh a resource.
    pub async fn read(&self, resource_type: &str, state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, state).await
    }

    /// Update a resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior, planned).await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, state).await
    }

    /// Import a resource by identifier.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Import a resource and complete its state with a read.
    pub async fn import_and_read(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Value, ProviderError> {
        let imported = self.import_resource(resource_type, id).await?;
        let state = imported
            .into_iter()
            .next()
            .map(|r| r.state)
            .ok_or_else(|| ProviderError::NotFound(format!("nothing imported for {}", id)))?;
        self.read(resource_type, state).await
    }

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        errors_only(
            self.provider
                .validate_data_source_config(data_source_type, config)
                .await?,
        )
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    /// Plan, create and read back a resource.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan, update and read back a resource.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior.clone(), config)
            .await?;
        let updated = self
            .update(resource_type, prior, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Plan the destruction of a resource and delete it.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, state.clone()).await?;
        self.delete(resource_type, state).await
    }

    /// Create, update and delete a resource. Returns the updated state.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial: Value,
        updated: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changed_paths()
}

/// Assert that `plan` creates without replacing.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(plan.has_changes(), "expected a create, but the plan has no changes");
    assert!(!plan.requires_replace, "expected a create, not a replacement");
}

/// Assert that `plan` changes nothing.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "expected no changes, got {:?}",
        changed_paths(plan)
    );
}

/// Assert that `plan` changes something.
pub fn assert_plan_has_changes(plan: &PlanResult) {
    assert!(plan.has_changes(), "expected changes, but the plan has none");
}

/// Assert that `plan` replaces the resource.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "expected a replacement, changed attributes: {:?}",
        changed_paths(plan)
    );
}

/// Assert that `plan` updates the resource in place.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "expected an in-place update, but {:?} force a replacement",
        changed_paths(plan)
    );
}

/// Assert that `plan` changes the attribute at `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        changed_paths(plan).contains(&path),
        "expected '{}' to change, changed attributes: {:?}",
        path,
        changed_paths(plan)
    );
}

/// Assert that `plan` leaves the attribute at `path` alone.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !changed_paths(plan).contains(&path),
        "expected '{}' to stay unchanged",
        path
    );
}

/// Assert that `diagnostics` has no errors.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<&str> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect();
    assert!(errors.is_empty(), "expected no errors, got {:?}", errors);
}

/// Assert that `diagnostics` has at least one error.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "expected at least one error, got none"
    );
}

/// Assert that one error of `diagnostics` mentions `substring`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let errors: Vec<&str> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect();
    assert!(
        errors.iter().any(|s| s.contains(substring)),
        "expected an error containing '{}', got {:?}",
        substring,
        errors
    );
}
