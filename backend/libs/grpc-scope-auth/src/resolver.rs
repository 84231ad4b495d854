//! Public key resolution strategies
//!
//! A verification key can come from a PEM file on disk, from a remote JWKS
//! endpoint, or be handed in directly. All three variants sit behind the
//! [`KeyResolver`] trait so the refresher and the tests are indifferent to
//! the origin.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::KeyResolutionError;

/// Produces an RS256 verification key from its configured source.
///
/// Implementations must be cheap to call repeatedly: the
/// [`KeyRefresher`](crate::KeyRefresher) invokes `resolve_key` once at
/// construction and then once per refresh interval, each attempt bounded by
/// the caller's timeout.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve_key(&self) -> Result<DecodingKey, KeyResolutionError>;
}

/// Resolves a PEM-encoded RSA public key from a file path.
///
/// A missing, unreadable, or malformed file yields
/// [`KeyResolutionError::Format`], never a panic. An earlier incarnation of
/// this layer crashed on an empty key file; the construction path is covered
/// by a regression test.
#[derive(Debug, Clone)]
pub struct FromFileKeyResolver {
    path: PathBuf,
}

impl FromFileKeyResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl KeyResolver for FromFileKeyResolver {
    async fn resolve_key(&self) -> Result<DecodingKey, KeyResolutionError> {
        let pem = tokio::fs::read(&self.path).await.map_err(|e| {
            KeyResolutionError::Format(format!("reading {}: {}", self.path.display(), e))
        })?;

        DecodingKey::from_rsa_pem(&pem)
            .map_err(|e| KeyResolutionError::Format(format!("not a PEM RSA public key: {}", e)))
    }
}

/// Returns a pre-supplied key. Used for bootstrapping and tests; never fails.
#[derive(Clone)]
pub struct FromMemoryKeyResolver {
    key: DecodingKey,
}

impl FromMemoryKeyResolver {
    pub fn new(key: DecodingKey) -> Self {
        Self { key }
    }
}

#[async_trait]
impl KeyResolver for FromMemoryKeyResolver {
    async fn resolve_key(&self) -> Result<DecodingKey, KeyResolutionError> {
        Ok(self.key.clone())
    }
}

/// Single key entry in a JWKS document (subset of RFC 7517)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// RSA modulus, base64url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent, base64url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

/// Complete JWKS document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// Fetches a JWKS document over HTTPS and extracts the entry matching a
/// configured key id.
///
/// The HTTP fetch is bounded by the client timeout supplied at construction;
/// a timeout surfaces as [`KeyResolutionError::Network`] like any other
/// fetch failure. Locating and decoding the key is pure and handled by
/// [`key_from_jwks`].
#[derive(Debug, Clone)]
pub struct JwksResolver {
    endpoint: Url,
    key_id: String,
    client: reqwest::Client,
}

impl JwksResolver {
    pub fn new(
        endpoint: Url,
        key_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, KeyResolutionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeyResolutionError::Network(e.to_string()))?;

        Ok(Self {
            endpoint,
            key_id: key_id.into(),
            client,
        })
    }
}

#[async_trait]
impl KeyResolver for JwksResolver {
    async fn resolve_key(&self) -> Result<DecodingKey, KeyResolutionError> {
        debug!(endpoint = %self.endpoint, kid = %self.key_id, "fetching JWKS");

        let jwks: Jwks = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| KeyResolutionError::Network(e.to_string()))?
            .json()
            .await
            .map_err(|e| KeyResolutionError::Network(format!("decoding JWKS body: {}", e)))?;

        key_from_jwks(&jwks, &self.key_id)
    }
}

/// Locate the entry with the given key id and decode its modulus/exponent
/// into an RSA verification key.
pub fn key_from_jwks(jwks: &Jwks, kid: &str) -> Result<DecodingKey, KeyResolutionError> {
    let jwk = jwks
        .keys
        .iter()
        .find(|k| k.kid == kid)
        .ok_or_else(|| KeyResolutionError::NotFound(kid.to_string()))?;

    if jwk.kty != "RSA" {
        return Err(KeyResolutionError::Format(format!(
            "key {:?} has unsupported type {:?}",
            kid, jwk.kty
        )));
    }

    let (n, e) = match (&jwk.n, &jwk.e) {
        (Some(n), Some(e)) => (n, e),
        _ => {
            return Err(KeyResolutionError::Format(format!(
                "key {:?} is missing modulus or exponent",
                kid
            )))
        }
    };

    DecodingKey::from_rsa_components(n, e)
        .map_err(|e| KeyResolutionError::Format(format!("key {:?}: {}", kid, e)))
}
