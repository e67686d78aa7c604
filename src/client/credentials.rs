//! Service account credentials.
//!
//! Credentials are a JSON document, supplied inline or as a file, either
//! through the provider configuration or the environment:
//!
//! - `INDYKITE_SERVICE_ACCOUNT_CREDENTIALS`: the JSON document itself
//! - `INDYKITE_SERVICE_ACCOUNT_CREDENTIALS_FILE`: path to the JSON document
//!
//! A pre-issued `token` is used as-is. Otherwise a short-lived ES256 JWT is
//! signed with the `privateKeyJWK` of the service account.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable holding the credentials JSON.
pub const CREDENTIALS_ENV: &str = "INDYKITE_SERVICE_ACCOUNT_CREDENTIALS";
/// Environment variable holding the path of the credentials JSON.
pub const CREDENTIALS_FILE_ENV: &str = "INDYKITE_SERVICE_ACCOUNT_CREDENTIALS_FILE";

/// Base URL used when the credentials point at no region.
pub const DEFAULT_BASE_URL: &str = "https://eu.api.indykite.com/configs/v1";
const US_BASE_URL: &str = "https://us.api.indykite.com/configs/v1";
const US_ENDPOINT: &str = "us.api.indykite.com";
const API_SUFFIX: &str = "/configs/v1";

const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Errors raised while loading credentials.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// Neither environment variable is set.
    #[error("{CREDENTIALS_ENV} or {CREDENTIALS_FILE_ENV} must be set")]
    Missing,

    /// The credentials file could not be read.
    #[error("failed to read credentials file {path}: {source}")]
    Io {
        /// Path of the credentials file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The credentials are not valid JSON.
    #[error("failed to parse credentials JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The private key is missing or is not an EC P-256 key.
    #[error("failed to parse private key JWK: {0}")]
    Jwk(String),

    /// The JWT could not be signed.
    #[error("failed to generate JWT token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ServiceAccount {
    app_space_id: String,
    service_account_id: String,
    endpoint: String,
    base_url: String,
    token: String,
    #[serde(rename = "privateKeyJWK")]
    private_key_jwk: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EcJwk {
    kty: String,
    #[serde(default)]
    crv: String,
    #[serde(default)]
    kid: Option<String>,
    x: String,
    y: String,
    d: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) iss: String,
    pub(crate) sub: String,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
    pub(crate) jti: String,
}

/// Resolved API location and bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Base URL of the configuration API, ending in `/configs/v1`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Create credentials from known values.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Load credentials from the environment.
    ///
    /// The inline variable wins over the file variable.
    pub fn from_env() -> Result<Self, CredentialsError> {
        let inline = std::env::var(CREDENTIALS_ENV).unwrap_or_default();
        if !inline.is_empty() {
            return Self::from_json(&inline);
        }
        match std::env::var(CREDENTIALS_FILE_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Err(CredentialsError::Missing),
        }
    }

    /// Load credentials from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| CredentialsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&data)
    }

    /// Parse the credentials JSON document.
    pub fn from_json(data: &str) -> Result<Self, CredentialsError> {
        let account: ServiceAccount = serde_json::from_str(data)?;
        let base_url = resolve_base_url(&account.base_url, &account.endpoint);

        if !account.token.is_empty() {
            debug!(base_url = %base_url, "Using pre-issued token");
            return Ok(Self::new(base_url, account.token));
        }

        let jwk = match account.private_key_jwk {
            Some(serde_json::Value::String(raw)) => serde_json::from_str::<EcJwk>(&raw)?,
            Some(value) => serde_json::from_value::<EcJwk>(value)?,
            None => {
                return Err(CredentialsError::Jwk(
                    "credentials contain neither token nor privateKeyJWK".to_string(),
                ))
            },
        };

        let subject = if account.service_account_id.is_empty() {
            account.app_space_id
        } else {
            account.service_account_id
        };
        let token = sign_token(&jwk, &subject)?;
        debug!(base_url = %base_url, subject = %subject, "Signed service account token");
        Ok(Self::new(base_url, token))
    }
}

fn resolve_base_url(base_url: &str, endpoint: &str) -> String {
    if !base_url.is_empty() {
        if base_url.ends_with(API_SUFFIX) {
            return base_url.to_string();
        }
        return format!("{}{}", base_url.trim_end_matches('/'), API_SUFFIX);
    }
    if endpoint.contains(US_ENDPOINT) {
        return US_BASE_URL.to_string();
    }
    DEFAULT_BASE_URL.to_string()
}

fn sign_token(jwk: &EcJwk, subject: &str) -> Result<String, CredentialsError> {
    let der = ec_private_key_der(jwk)?;
    let key = EncodingKey::from_ec_der(&der);

    let mut header = Header::new(Algorithm::ES256);
    header.kid = jwk.kid.clone();

    let now = Utc::now();
    let claims = Claims {
        iss: subject.to_string(),
        sub: subject.to_string(),
        iat: now.timestamp(),
        exp: now.timestamp() + TOKEN_LIFETIME_SECS,
        jti: now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros() * 1000)
            .to_string(),
    };

    Ok(jsonwebtoken::encode(&header, &claims, &key)?)
}

/// Assemble a PKCS#8 document for a P-256 private key from its JWK parts.
fn ec_private_key_der(jwk: &EcJwk) -> Result<Vec<u8>, CredentialsError> {
    if jwk.kty != "EC" {
        return Err(CredentialsError::Jwk(format!(
            "key is not an ECDSA private key, got kty {}",
            jwk.kty
        )));
    }
    if !jwk.crv.is_empty() && jwk.crv != "P-256" {
        return Err(CredentialsError::Jwk(format!(
            "unsupported curve {}",
            jwk.crv
        )));
    }
    let d = jwk
        .d
        .as_deref()
        .ok_or_else(|| CredentialsError::Jwk("JWK has no private component".to_string()))?;

    let d = decode_coordinate("d", d)?;
    let x = decode_coordinate("x", &jwk.x)?;
    let y = decode_coordinate("y", &jwk.y)?;

    let mut der = Vec::with_capacity(138);
    der.extend_from_slice(&[0x30, 0x81, 0x87, 0x02, 0x01, 0x00]);
    // AlgorithmIdentifier: id-ecPublicKey, prime256v1
    der.extend_from_slice(&[
        0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08, 0x2a, 0x86,
        0x48, 0xce, 0x3d, 0x03, 0x01, 0x07,
    ]);
    // ECPrivateKey with embedded public point
    der.extend_from_slice(&[0x04, 0x6d, 0x30, 0x6b, 0x02, 0x01, 0x01, 0x04, 0x20]);
    der.extend_from_slice(&d);
    der.extend_from_slice(&[0xa1, 0x44, 0x03, 0x42, 0x00, 0x04]);
    der.extend_from_slice(&x);
    der.extend_from_slice(&y);
    Ok(der)
}

fn decode_coordinate(name: &str, value: &str) -> Result<[u8; 32], CredentialsError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| CredentialsError::Jwk(format!("invalid base64 in '{}': {}", name, e)))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        CredentialsError::Jwk(format!("'{}' must be 32 bytes, got {}", name, b.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};

    // ES256 key from RFC 7515, appendix A.3.
    const JWK_X: &str = "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU";
    const JWK_Y: &str = "x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0";
    const JWK_D: &str = "jpsQnnGQmL-YBIffH1136cLQXWPlSvaXMXmhYuHHyaw";

    fn private_jwk() -> serde_json::Value {
        serde_json::json!({
            "kty": "EC",
            "crv": "P-256",
            "kid": "key-1",
            "x": JWK_X,
            "y": JWK_Y,
            "d": JWK_D,
        })
    }

    #[test]
    fn test_base_url_resolution() {
        assert_eq!(
            resolve_base_url("https://custom.example.com", ""),
            "https://custom.example.com/configs/v1"
        );
        assert_eq!(
            resolve_base_url("https://custom.example.com/", ""),
            "https://custom.example.com/configs/v1"
        );
        assert_eq!(
            resolve_base_url("https://custom.example.com/configs/v1", ""),
            "https://custom.example.com/configs/v1"
        );
        assert_eq!(
            resolve_base_url("", "https://us.api.indykite.com"),
            US_BASE_URL
        );
        assert_eq!(resolve_base_url("", "https://eu.api.indykite.com"), DEFAULT_BASE_URL);
        assert_eq!(resolve_base_url("", ""), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_token_used_verbatim() {
        let creds = Credentials::from_json(
            r#"{"baseUrl": "https://api.example.com", "token": "abc.def.ghi"}"#,
        )
        .unwrap();
        assert_eq!(creds.token, "abc.def.ghi");
        assert_eq!(creds.base_url, "https://api.example.com/configs/v1");
    }

    #[test]
    fn test_signed_token_claims() {
        let doc = serde_json::json!({
            "serviceAccountId": "gid:service-account",
            "appSpaceId": "gid:app-space",
            "privateKeyJWK": private_jwk(),
        });
        let creds = Credentials::from_json(&doc.to_string()).unwrap();
        assert_eq!(creds.base_url, DEFAULT_BASE_URL);

        let header = jsonwebtoken::decode_header(&creds.token).unwrap();
        assert_eq!(header.alg, Algorithm::ES256);
        assert_eq!(header.kid.as_deref(), Some("key-1"));

        let key = DecodingKey::from_ec_components(JWK_X, JWK_Y).unwrap();
        let data =
            jsonwebtoken::decode::<Claims>(&creds.token, &key, &Validation::new(Algorithm::ES256))
                .unwrap();
        assert_eq!(data.claims.iss, "gid:service-account");
        assert_eq!(data.claims.sub, "gid:service-account");
        assert_eq!(data.claims.exp - data.claims.iat, TOKEN_LIFETIME_SECS);
        assert!(!data.claims.jti.is_empty());
    }

    #[test]
    fn test_subject_falls_back_to_app_space() {
        let doc = serde_json::json!({
            "appSpaceId": "gid:app-space",
            "privateKeyJWK": private_jwk().to_string(),
        });
        let creds = Credentials::from_json(&doc.to_string()).unwrap();
        let key = DecodingKey::from_ec_components(JWK_X, JWK_Y).unwrap();
        let data =
            jsonwebtoken::decode::<Claims>(&creds.token, &key, &Validation::new(Algorithm::ES256))
                .unwrap();
        assert_eq!(data.claims.sub, "gid:app-space");
    }

    #[test]
    fn test_rejects_non_ec_key() {
        let doc = serde_json::json!({
            "privateKeyJWK": {"kty": "RSA", "x": JWK_X, "y": JWK_Y, "d": JWK_D},
        });
        let err = Credentials::from_json(&doc.to_string()).unwrap_err();
        assert!(matches!(err, CredentialsError::Jwk(_)));
    }

    #[test]
    fn test_rejects_missing_key_material() {
        let err = Credentials::from_json(r#"{"appSpaceId": "gid:x"}"#).unwrap_err();
        assert!(matches!(err, CredentialsError::Jwk(_)));

        let err = Credentials::from_json("not json").unwrap_err();
        assert!(matches!(err, CredentialsError::Json(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{"endpoint": "https://us.api.indykite.com", "token": "t"}"#,
        )
        .unwrap();

        let creds = Credentials::from_file(file.path()).unwrap();
        assert_eq!(creds.base_url, US_BASE_URL);
        assert_eq!(creds.token, "t");

        let err = Credentials::from_file("/nonexistent/credentials.json").unwrap_err();
        assert!(matches!(err, CredentialsError::Io { .. }));
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = Credentials::new(DEFAULT_BASE_URL, "secret-token");
        assert!(!format!("{:?}", creds).contains("secret-token"));
    }
}
