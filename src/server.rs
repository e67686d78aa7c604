//! The [`ProviderService`] trait and the gRPC server around it.
//!
//! # Signal Handling
//!
//! [`serve`] handles SIGTERM and SIGINT (Ctrl+C on other platforms). When a
//! signal arrives the server:
//! 1. Stops accepting new connections
//! 2. Waits for in-flight requests, at most [`ServeOptions::shutdown_timeout`]
//! 3. Calls the provider's `stop()` method

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tonic::transport::Server;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated::provider as proto;
use crate::generated::provider::provider_server::{Provider, ProviderServer};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{
    ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};

/// Operations the host runtime invokes on the provider.
///
/// Configuration and state travel as `serde_json::Value`; the gRPC adapter
/// takes care of the wire encoding.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata, derived from the schema by default.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.into_keys().collect(),
            data_sources: schema.data_sources.into_keys().collect(),
            capabilities: Default::default(),
        }
    }

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(
        &self,
        config: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: serde_json::Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Upgrade resource state from an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Plan changes for a resource. `prior_state` is `None` on create.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<serde_json::Value>,
        proposed_state: serde_json::Value,
        config: serde_json::Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Read the current state of a resource.
    ///
    /// Returns [`ProviderError::NotFound`] when the remote object is gone.
    async fn read(
        &self,
        resource_type: &str,
        current_state: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: serde_json::Value,
        planned_state: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Delete a resource.
    async fn delete(
        &self,
        resource_type: &str,
        current_state: serde_json::Value,
    ) -> Result<(), ProviderError>;

    /// Import an existing object by identifier.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            data_source_type
        )))
    }
}

/// Adapter exposing a [`ProviderService`] as the generated gRPC service.
///
/// Provider errors never surface as gRPC errors; they are returned as error
/// diagnostics inside the response.
pub struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

impl<P: ProviderService> ProviderGrpcService<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    /// Wrap a shared provider.
    pub fn from_arc(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Build the tonic service.
    pub fn into_server(self) -> ProviderServer<Self> {
        ProviderServer::new(self)
    }
}

fn decode_json(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).unwrap_or(serde_json::Value::Null)
}

fn encode_json(value: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

fn error_to_diagnostics(err: ProviderError) -> Vec<proto::Diagnostic> {
    vec![proto::Diagnostic::from(Diagnostic::error(err.to_string()))]
}

/// Log the outcome of a validating RPC and encode its diagnostics.
fn diagnostics_reply(
    rpc: &'static str,
    subject: &str,
    result: Result<Vec<Diagnostic>, ProviderError>,
) -> Vec<proto::Diagnostic> {
    match result {
        Ok(diagnostics) => {
            if diagnostics.iter().any(Diagnostic::is_error) {
                warn!(rpc, subject, diagnostics = diagnostics.len(), "Completed with errors");
            } else {
                info!(rpc, subject, "Completed successfully");
            }
            diagnostics.into_iter().map(Into::into).collect()
        },
        Err(e) => {
            error!(rpc, subject, error = %e, "Failed");
            error_to_diagnostics(e)
        },
    }
}

/// Log the outcome of a state-returning RPC and encode the state.
fn state_reply(
    rpc: &'static str,
    subject: &str,
    result: Result<serde_json::Value, ProviderError>,
) -> (Vec<u8>, Vec<proto::Diagnostic>) {
    match result {
        Ok(state) => {
            info!(rpc, subject, "Completed successfully");
            (encode_json(&state), vec![])
        },
        Err(e) => {
            error!(rpc, subject, error = %e, "Failed");
            (vec![], error_to_diagnostics(e))
        },
    }
}

#[tonic::async_trait]
impl<P: ProviderService> Provider for ProviderGrpcService<P> {
    #[instrument(skip_all, name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: tonic::Request<proto::GetMetadataRequest>,
    ) -> Result<tonic::Response<proto::GetMetadataResponse>, tonic::Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "GetMetadata"
        );
        Ok(tonic::Response::new(proto::GetMetadataResponse {
            server_capabilities: Some(proto::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: tonic::Request<proto::GetSchemaRequest>,
    ) -> Result<tonic::Response<proto::GetSchemaResponse>, tonic::Status> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema"
        );
        let encode = |schemas: &std::collections::BTreeMap<String, crate::schema::Schema>| {
            schemas
                .iter()
                .map(|(name, schema)| (name.clone(), proto::Schema::from(schema)))
                .collect()
        };
        Ok(tonic::Response::new(proto::GetSchemaResponse {
            provider: Some(proto::Schema::from(&schema.provider)),
            resources: encode(&schema.resources),
            data_sources: encode(&schema.data_sources),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: tonic::Request<proto::ValidateProviderConfigRequest>,
    ) -> Result<tonic::Response<proto::ValidateProviderConfigResponse>, tonic::Status> {
        let config = decode_json(&request.into_inner().config);
        let result = self.provider.validate_provider_config(config).await;
        Ok(tonic::Response::new(proto::ValidateProviderConfigResponse {
            diagnostics: diagnostics_reply("ValidateProviderConfig", "provider", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: tonic::Request<proto::ConfigureRequest>,
    ) -> Result<tonic::Response<proto::ConfigureResponse>, tonic::Status> {
        let config = decode_json(&request.into_inner().config);
        let result = self.provider.configure(config).await;
        Ok(tonic::Response::new(proto::ConfigureResponse {
            diagnostics: diagnostics_reply("Configure", "provider", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(
        &self,
        _request: tonic::Request<proto::StopRequest>,
    ) -> Result<tonic::Response<proto::StopResponse>, tonic::Status> {
        info!("Stop requested");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            },
        };
        Ok(tonic::Response::new(proto::StopResponse { error }))
    }

    #[instrument(skip_all, name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: tonic::Request<proto::ValidateResourceConfigRequest>,
    ) -> Result<tonic::Response<proto::ValidateResourceConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .validate_resource_config(&req.resource_type, decode_json(&req.config))
            .await;
        Ok(tonic::Response::new(proto::ValidateResourceConfigResponse {
            diagnostics: diagnostics_reply("ValidateResourceConfig", &req.resource_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.upgrade_resource_state")]
    async fn upgrade_resource_state(
        &self,
        request: tonic::Request<proto::UpgradeResourceStateRequest>,
    ) -> Result<tonic::Response<proto::UpgradeResourceStateResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(resource_type = %req.resource_type, version = req.version, "UpgradeResourceState");
        let result = self
            .provider
            .upgrade_resource_state(&req.resource_type, req.version, decode_json(&req.raw_state))
            .await;
        let (upgraded_state, diagnostics) =
            state_reply("UpgradeResourceState", &req.resource_type, result);
        Ok(tonic::Response::new(proto::UpgradeResourceStateResponse {
            upgraded_state,
            diagnostics,
        }))
    }

    #[instrument(skip_all, name = "grpc.plan")]
    async fn plan(
        &self,
        request: tonic::Request<proto::PlanRequest>,
    ) -> Result<tonic::Response<proto::PlanResponse>, tonic::Status> {
        let req = request.into_inner();
        // No prior state means the resource is about to be created.
        let prior_state = if req.prior_state.is_empty() {
            None
        } else {
            serde_json::from_slice(&req.prior_state).ok()
        };

        let result = self
            .provider
            .plan(
                &req.resource_type,
                prior_state,
                decode_json(&req.proposed_state),
                decode_json(&req.config),
            )
            .await;
        let response = match result {
            Ok(plan) => {
                info!(
                    resource_type = %req.resource_type,
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "Plan computed"
                );
                proto::PlanResponse {
                    planned_state: encode_json(&plan.planned_state),
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Plan failed");
                proto::PlanResponse {
                    diagnostics: error_to_diagnostics(e),
                    ..Default::default()
                }
            },
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.create")]
    async fn create(
        &self,
        request: tonic::Request<proto::CreateRequest>,
    ) -> Result<tonic::Response<proto::CreateResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .create(&req.resource_type, decode_json(&req.planned_state))
            .await;
        let (state, diagnostics) = state_reply("Create", &req.resource_type, result);
        Ok(tonic::Response::new(proto::CreateResponse { state, diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.read")]
    async fn read(
        &self,
        request: tonic::Request<proto::ReadRequest>,
    ) -> Result<tonic::Response<proto::ReadResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .read(&req.resource_type, decode_json(&req.current_state))
            .await;
        let (state, diagnostics) = match result {
            // An empty state tells the host the object is gone.
            Err(ProviderError::NotFound(reason)) => {
                warn!(resource_type = %req.resource_type, %reason, "Removing from state");
                (vec![], vec![])
            },
            other => state_reply("Read", &req.resource_type, other),
        };
        Ok(tonic::Response::new(proto::ReadResponse { state, diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.update")]
    async fn update(
        &self,
        request: tonic::Request<proto::UpdateRequest>,
    ) -> Result<tonic::Response<proto::UpdateResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .update(
                &req.resource_type,
                decode_json(&req.prior_state),
                decode_json(&req.planned_state),
            )
            .await;
        let (state, diagnostics) = state_reply("Update", &req.resource_type, result);
        Ok(tonic::Response::new(proto::UpdateResponse { state, diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.delete")]
    async fn delete(
        &self,
        request: tonic::Request<proto::DeleteRequest>,
    ) -> Result<tonic::Response<proto::DeleteResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .delete(&req.resource_type, decode_json(&req.current_state))
            .await
            .map(|()| vec![]);
        Ok(tonic::Response::new(proto::DeleteResponse {
            diagnostics: diagnostics_reply("Delete", &req.resource_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.import_resource_state")]
    async fn import_resource_state(
        &self,
        request: tonic::Request<proto::ImportResourceStateRequest>,
    ) -> Result<tonic::Response<proto::ImportResourceStateResponse>, tonic::Status> {
        let req = request.into_inner();
        let response = match self.provider.import_resource(&req.resource_type, &req.id).await {
            Ok(imported) => {
                info!(resource_type = %req.resource_type, id = %req.id, "Imported");
                proto::ImportResourceStateResponse {
                    imported: imported.into_iter().map(Into::into).collect(),
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, id = %req.id, error = %e, "Import failed");
                proto::ImportResourceStateResponse {
                    imported: vec![],
                    diagnostics: error_to_diagnostics(e),
                }
            },
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.validate_data_source_config")]
    async fn validate_data_source_config(
        &self,
        request: tonic::Request<proto::ValidateDataSourceConfigRequest>,
    ) -> Result<tonic::Response<proto::ValidateDataSourceConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .validate_data_source_config(&req.data_source_type, decode_json(&req.config))
            .await;
        Ok(tonic::Response::new(proto::ValidateDataSourceConfigResponse {
            diagnostics: diagnostics_reply("ValidateDataSourceConfig", &req.data_source_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.read_data_source")]
    async fn read_data_source(
        &self,
        request: tonic::Request<proto::ReadDataSourceRequest>,
    ) -> Result<tonic::Response<proto::ReadDataSourceResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .read_data_source(&req.data_source_type, decode_json(&req.config))
            .await;
        let (state, diagnostics) = state_reply("ReadDataSource", &req.data_source_type, result);
        Ok(tonic::Response::new(proto::ReadDataSourceResponse { state, diagnostics }))
    }
}

/// Options for running the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may take to finish once a shutdown
    /// signal arrived. Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Create new serve options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Wait for SIGTERM or SIGINT, or Ctrl+C where unix signals are unavailable.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
                    _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
                }
                return;
            },
            _ => warn!("Failed to install signal handlers, falling back to Ctrl+C"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C, serving until killed");
            std::future::pending::<()>().await;
        },
    }
}

/// Serve a provider on a free localhost port.
///
/// Prints the handshake `INDYKITE_PROVIDER|<version>|<address>` to stdout
/// and serves until SIGTERM or SIGINT.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Serve a provider on a free localhost port with custom options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_listener(provider, listener, options, wait_for_shutdown_signal()).await
}

/// Serve a provider on a specific address.
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

/// Serve a provider on a specific address with custom options.
pub async fn serve_on_with_options<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    serve_listener(provider, listener, options, wait_for_shutdown_signal()).await
}

/// Serve a provider on a bound listener until `shutdown` completes.
///
/// The shutdown timeout only bounds the drain that follows `shutdown`;
/// the server itself runs for as long as it takes.
pub async fn serve_listener<P, F>(
    provider: P,
    listener: TcpListener,
    options: ServeOptions,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    P: ProviderService,
    F: Future<Output = ()>,
{
    let addr = listener.local_addr()?;
    println!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr);
    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let service = ProviderGrpcService::from_arc(Arc::clone(&provider)).into_server();

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(
        Server::builder()
            .add_service(service)
            .serve_with_incoming_shutdown(
                tokio_stream::wrappers::TcpListenerStream::new(listener),
                async {
                    let _ = drain_rx.await;
                },
            ),
    );

    tokio::select! {
        result = &mut server => {
            result??;
            info!("Server stopped");
        }
        _ = shutdown => {
            let _ = drain_tx.send(());
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(result) => {
                    if let Err(e) = result? {
                        error!(error = %e, "Server error during shutdown");
                        return Err(e.into());
                    }
                    info!("Server shutdown complete");
                },
                Err(_) => {
                    warn!(
                        timeout = ?options.shutdown_timeout,
                        "Shutdown timeout exceeded, forcing shutdown"
                    );
                    server.abort();
                },
            }
        }
    }

    debug!("Calling provider stop()");
    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider stop() returned error");
    }

    info!("Provider shutdown complete");
    Ok(())
}
