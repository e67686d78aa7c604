//! Build script for proto compilation.
//!
//! Protos are parsed with `protox`, so no system `protoc` is required. The
//! resulting descriptor set is handed to `tonic-prost-build`, which generates
//! the provider service and the configuration API messages into `OUT_DIR`.
//! Proto maps become `BTreeMap`s.
//!
//! Configuration API messages additionally derive serde so they can be sent
//! to and read from the REST API directly.

const PROTOS: &[&str] = &[
    "proto/indykite/provider/v1/provider.proto",
    "proto/indykite/config/v1/config.proto",
];

const CONFIG_PACKAGE: &str = ".indykite.config.v1";

/// Fields the API expects in snake_case instead of camelCase.
const SNAKE_CASE_FIELDS: &[&str] = &[
    "CreateApplicationSpaceRequest.organization_id",
    "CreateApplicationRequest.project_id",
    "CreateApplicationAgentRequest.application_id",
    "CreateApplicationAgentRequest.api_permissions",
    "UpdateApplicationAgentRequest.api_permissions",
    "CreateApplicationAgentCredentialRequest.application_agent_id",
    "CreateAuthorizationPolicyRequest.project_id",
];

/// String fields omitted from the request body when empty.
const OMIT_EMPTY_STRINGS: &[&str] = &[
    "DbConnection.url",
    "DbConnection.username",
    "DbConnection.password",
    "DbConnection.name",
    "CreateApplicationSpaceRequest.display_name",
    "CreateApplicationSpaceRequest.description",
    "CreateApplicationSpaceRequest.region",
    "CreateApplicationSpaceRequest.ikg_size",
    "CreateApplicationSpaceRequest.replica_region",
    "CreateApplicationRequest.display_name",
    "CreateApplicationRequest.description",
    "CreateApplicationAgentRequest.display_name",
    "CreateApplicationAgentRequest.description",
    "CreateApplicationAgentCredentialRequest.display_name",
    "CreateApplicationAgentCredentialRequest.expire_time",
    "CreateApplicationAgentCredentialRequest.default_tenant_id",
    "CreateApplicationAgentCredentialRequest.public_key_pem",
    "CreateApplicationAgentCredentialRequest.public_key_jwk",
    "CreateAuthorizationPolicyRequest.display_name",
    "CreateAuthorizationPolicyRequest.description",
];

/// Optional fields omitted from the request body when unset.
const OMIT_NONE: &[&str] = &[
    "CreateApplicationSpaceRequest.db_connection",
    "UpdateApplicationSpaceRequest.display_name",
    "UpdateApplicationSpaceRequest.description",
    "UpdateApplicationSpaceRequest.db_connection",
    "UpdateApplicationRequest.display_name",
    "UpdateApplicationRequest.description",
    "UpdateApplicationAgentRequest.display_name",
    "UpdateApplicationAgentRequest.description",
    "UpdateAuthorizationPolicyRequest.display_name",
    "UpdateAuthorizationPolicyRequest.description",
    "UpdateAuthorizationPolicyRequest.policy",
    "UpdateAuthorizationPolicyRequest.status",
];

/// Repeated fields omitted from the request body when empty.
const OMIT_EMPTY_LISTS: &[&str] = &[
    "CreateApplicationAgentRequest.api_permissions",
    "UpdateApplicationAgentRequest.api_permissions",
    "CreateAuthorizationPolicyRequest.tags",
    "UpdateAuthorizationPolicyRequest.tags",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    for proto in PROTOS {
        println!("cargo:rerun-if-changed={}", proto);
    }

    let fds = protox::compile(PROTOS, ["proto/"])?;

    let mut config = prost_build::Config::new();
    // Map fields iterate in key order, so equal messages print identically.
    config
        .btree_map(["."])
        .enable_type_names()
        .type_attribute(
            CONFIG_PACKAGE,
            "#[derive(serde::Serialize, serde::Deserialize)]",
        )
        .type_attribute(CONFIG_PACKAGE, "#[serde(rename_all = \"camelCase\", default)]");

    for field in SNAKE_CASE_FIELDS {
        let name = field.rsplit('.').next().unwrap_or(field);
        config.field_attribute(
            format!("{}.{}", CONFIG_PACKAGE, field),
            format!("#[serde(rename = \"{}\")]", name),
        );
    }
    for field in OMIT_EMPTY_STRINGS {
        config.field_attribute(
            format!("{}.{}", CONFIG_PACKAGE, field),
            "#[serde(skip_serializing_if = \"String::is_empty\")]",
        );
    }
    for field in OMIT_NONE {
        config.field_attribute(
            format!("{}.{}", CONFIG_PACKAGE, field),
            "#[serde(skip_serializing_if = \"Option::is_none\")]",
        );
    }
    for field in OMIT_EMPTY_LISTS {
        config.field_attribute(
            format!("{}.{}", CONFIG_PACKAGE, field),
            "#[serde(skip_serializing_if = \"Vec::is_empty\")]",
        );
    }

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_fds_with_config(fds, config)?;

    Ok(())
}
