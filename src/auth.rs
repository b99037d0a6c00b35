//! Bearer token verification for the authenticated hosting variant.
//!
//! Token issuance and validation belong to the identity provider; this module
//! parses the header and asks a [`TokenVerifier`] for a yes/no answer.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

pub const DEFAULT_LOOKUP_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:lookup";

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Empty bearer token")]
    EmptyToken,
    #[error("Invalid auth token")]
    InvalidToken,
}

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }
    Ok(token)
}

#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<(), AuthError>;
}

/// Verifies ID tokens with the identity provider's `accounts:lookup` endpoint.
#[derive(Debug, Clone)]
pub struct IdentityToolkitVerifier {
    client: reqwest::Client,
    lookup_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<serde_json::Value>,
}

impl IdentityToolkitVerifier {
    pub fn new(
        lookup_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            lookup_url: lookup_url.into(),
            api_key: api_key.into(),
        })
    }

    async fn lookup(&self, token: &str) -> Result<bool, reqwest::Error> {
        let response = self
            .client
            .post(&self.lookup_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "idToken": token }))
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "token lookup rejected");
            return Ok(false);
        }
        let body: LookupResponse = response.json().await?;
        Ok(!body.users.is_empty())
    }
}

#[async_trait::async_trait]
impl TokenVerifier for IdentityToolkitVerifier {
    async fn verify(&self, token: &str) -> Result<(), AuthError> {
        match self.lookup(token).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::InvalidToken),
            Err(err) => {
                // The lookup URL carries the web API key.
                warn!(error = %err.without_url(), "bearer verification failed");
                Err(AuthError::InvalidToken)
            }
        }
    }
}
