//! IndyKite infrastructure-as-code provider.
//!
//! The provider is a plugin process: the host runtime starts it, reads the
//! handshake line from stdout and then drives it over gRPC. Every resource
//! and data source maps onto the IndyKite configuration REST API.
//!
//! # Overview
//!
//! - [`server`]: the [`ProviderService`] trait, the gRPC adapter and [`serve`]
//! - [`provider`]: [`IndykiteProvider`], routing operations to handlers
//! - [`resources`] and [`data_sources`]: one handler per object type
//! - [`client`]: the [`ConfigClient`](client::ConfigClient) trait and its REST implementation
//! - [`schema`], [`validation`] and [`plan`]: schemas, config checks and diffs
//! - [`matchers`]: proto-aware matchers usable as `mockall` predicates
//! - [`testing`] and [`tfstate`]: test harnesses
//!
//! # Handshake
//!
//! ```text
//! INDYKITE_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `INDYKITE_PROVIDER|<protocol_version>|<address>`.
//!
//! # Configuration
//!
//! ```hcl
//! provider "indykite" {
//!   credentials_file = "service_account.json"
//! }
//! ```
//!
//! Without `credentials_json` or `credentials_file` the credentials come from
//! `INDYKITE_SERVICE_ACCOUNT_CREDENTIALS` or
//! `INDYKITE_SERVICE_ACCOUNT_CREDENTIALS_FILE`.

#![warn(clippy::all)]

pub mod client;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod matchers;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod tfstate;
pub mod types;
pub mod validation;

#[allow(clippy::all)]
pub mod generated;

pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::IndykiteProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_listener, serve_on, serve_on_with_options, serve_with_options, ProviderService,
    ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};
