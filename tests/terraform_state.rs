use std::io::Write;

use indykite_provider::client::{Credentials, RestConfigClient, DEFAULT_TIMEOUT};
use indykite_provider::tfstate::{Outcome, StateError, StateVerifier, TerraformState};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APP_SPACE_ID: &str = "gid:AAAAAmluZHlraURlgAABDwAAAAA";
const APPLICATION_ID: &str = "gid:AAAABGluZHlraURlgAACDwAAAAA";
const AGENT_ID: &str = "gid:AAAABWluZHlraURlgAAFDwAAAAA";
const CREDENTIAL_ID: &str = "gid:AAAAB2luZHlraURlgAAGDwAAAAA";
const POLICY_ID: &str = "gid:AAAAHWluZHlraURlgAAHDwAAAAA";

fn resource(resource_type: &str, name: &str, id: &str) -> serde_json::Value {
    json!({
        "mode": "managed",
        "type": resource_type,
        "name": name,
        "provider": "provider[\"registry.terraform.io/indykite/indykite\"]",
        "instances": [{"schema_version": 0, "attributes": {"id": id, "name": name}}]
    })
}

fn state_file() -> tempfile::NamedTempFile {
    let state = json!({
        "version": 4,
        "terraform_version": "1.7.5",
        "serial": 12,
        "resources": [
            resource("indykite_application_space", "appspace", APP_SPACE_ID),
            resource("indykite_application", "application", APPLICATION_ID),
            resource("indykite_application_agent", "agent", AGENT_ID),
            resource("indykite_application_agent_credential", "with_public", CREDENTIAL_ID),
            resource("indykite_authorization_policy", "policy_drive_car", POLICY_ID),
        ]
    });
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(state.to_string().as_bytes()).unwrap();
    file
}

async fn mount_read(server: &MockServer, collection: &str, body: serde_json::Value) {
    let id = body["id"].as_str().unwrap().to_string();
    Mock::given(method("GET"))
        .and(path(format!("{}/{}", collection, id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

#[test]
fn test_load_state_file() {
    let file = state_file();
    let state = TerraformState::load(file.path()).unwrap();

    let ids = state.ids_by_name();
    assert_eq!(ids.len(), 5);
    assert_eq!(ids["appspace"], APP_SPACE_ID);
    assert_eq!(ids["with_public"], CREDENTIAL_ID);
    assert_eq!(state.id_of("agent"), Some(AGENT_ID));
}

#[test]
fn test_missing_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = TerraformState::load(dir.path().join("terraform.tfstate")).unwrap_err();
    assert!(matches!(err, StateError::Io { .. }));
    assert!(err.to_string().contains("terraform.tfstate"));
}

#[tokio::test]
async fn test_verify_against_api() {
    let server = MockServer::start().await;
    mount_read(&server, "/projects", json!({"id": APP_SPACE_ID, "name": "appspace"})).await;
    mount_read(&server, "/applications", json!({"id": APPLICATION_ID})).await;
    mount_read(&server, "/application-agents", json!({"id": AGENT_ID})).await;
    mount_read(
        &server,
        "/authorization-policies",
        json!({"id": POLICY_ID, "policy": "{\"meta\":{\"policyVersion\":\"1.0-indykite\"}}"}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("/application-agent-credentials/{}", CREDENTIAL_ID)))
        .respond_with(ResponseTemplate::new(404).set_body_string("credential not found"))
        .expect(1)
        .mount(&server)
        .await;

    let file = state_file();
    let state = TerraformState::load(file.path()).unwrap();
    let client = RestConfigClient::new(server.uri(), "test-token").unwrap();
    let results = StateVerifier::new(&client).verify(&state).await.unwrap();

    let outcomes: Vec<(&str, &Outcome)> = results
        .iter()
        .map(|r| (r.name.as_str(), &r.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("appspace", &Outcome::Verified),
            ("application", &Outcome::Verified),
            ("agent", &Outcome::Verified),
            ("with_public", &Outcome::Missing),
            ("policy_drive_car", &Outcome::Verified),
        ]
    );
}

#[tokio::test]
async fn test_verify_reports_id_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/projects/{}", APP_SPACE_ID)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "gid:AAAAAmluZHlraURlgAABDwAAAAB"})),
        )
        .mount(&server)
        .await;

    let state = TerraformState::from_json(
        &json!({"resources": [resource("indykite_application_space", "appspace", APP_SPACE_ID)]})
            .to_string(),
    )
    .unwrap();
    let client = RestConfigClient::new(server.uri(), "test-token").unwrap();
    let results = StateVerifier::new(&client).verify(&state).await.unwrap();

    assert!(results[0].is_failure());
    assert_eq!(
        results[0].outcome.to_string(),
        format!(
            "id mismatch: expected {:?}, got {:?}",
            APP_SPACE_ID, "gid:AAAAAmluZHlraURlgAABDwAAAAB"
        )
    );
}

/// Verifies the state file of a real apply.
///
/// Run with `INDYKITE_TFSTATE=path/to/terraform.tfstate` and service account
/// credentials in the environment:
///
/// ```bash
/// cargo test --test terraform_state -- --ignored
/// ```
#[tokio::test]
#[ignore]
async fn test_live_state() {
    let path = std::env::var("INDYKITE_TFSTATE").expect("INDYKITE_TFSTATE must be set");
    let state = TerraformState::load(path).unwrap();
    let credentials = Credentials::from_env().unwrap();
    let client = RestConfigClient::from_credentials(&credentials, DEFAULT_TIMEOUT).unwrap();

    let results = StateVerifier::new(&client).verify(&state).await.unwrap();
    let failures: Vec<String> = results
        .iter()
        .filter(|r| r.is_failure())
        .map(|r| format!("{} ({}): {}", r.name, r.resource_type, r.outcome))
        .collect();
    assert!(failures.is_empty(), "verification failed:\n{}", failures.join("\n"));
}
