//! Client for the external identity provider.
//!
//! All credential handling is delegated: the provider mints opaque
//! session cookies from ID tokens, verifies them (with revocation
//! checking), and owns account creation. This module only speaks the
//! provider's HTTP API; it never inspects token contents itself.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("invalid or expired session")]
    InvalidSession,
    #[error("session has been revoked")]
    Revoked,
    #[error("invalid ID token")]
    InvalidIdToken,
    #[error("identity provider rejected the request: {0}")]
    Provider(String),
    #[error("network error talking to identity provider: {0}")]
    Network(String),
}

/// The `(uid, email, expiry)` triple a verified session resolves to.
#[derive(Clone, Debug, Deserialize)]
pub struct VerifiedSession {
    pub uid: String,
    pub email: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchanges a freshly obtained ID token for an opaque session cookie.
    async fn create_session(
        &self,
        id_token: &str,
        valid_for: Duration,
    ) -> Result<String, IdentityError>;

    /// Verifies an opaque session cookie, checking server-side revocation.
    async fn verify_session(&self, session_cookie: &str) -> Result<VerifiedSession, IdentityError>;

    /// Revokes all sessions of a uid, invalidating outstanding cookies.
    async fn revoke_sessions(&self, uid: &str) -> Result<(), IdentityError>;

    /// Creates an account at the provider; returns the new uid.
    async fn create_user(&self, email: &str, password: &str) -> Result<String, IdentityError>;
}

// --- Wire types ---

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    id_token: &'a str,
    valid_duration_seconds: i64,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    session_cookie: String,
}

#[derive(Serialize)]
struct VerifySessionRequest<'a> {
    session_cookie: &'a str,
    check_revoked: bool,
}

#[derive(Serialize)]
struct CreateUserRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct CreateUserResponse {
    uid: String,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error: String,
}

/// `reqwest`-backed implementation; constructed once at startup and
/// injected as `Arc<dyn IdentityProvider>`.
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap(); // Should not fail with default settings
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn provider_error(response: reqwest::Response) -> IdentityError {
        let status = response.status();
        let detail = response
            .json::<ProviderErrorBody>()
            .await
            .map(|b| b.error)
            .unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED if detail.contains("REVOKED") => IdentityError::Revoked,
            StatusCode::UNAUTHORIZED => IdentityError::InvalidSession,
            _ => IdentityError::Provider(format!("{status}: {detail}")),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn create_session(
        &self,
        id_token: &str,
        valid_for: Duration,
    ) -> Result<String, IdentityError> {
        let response = self
            .client
            .post(format!("{}/v1/sessions?key={}", self.base_url, self.api_key))
            .json(&CreateSessionRequest {
                id_token,
                valid_duration_seconds: valid_for.num_seconds(),
            })
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(IdentityError::InvalidIdToken);
        }
        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        response
            .json::<CreateSessionResponse>()
            .await
            .map(|r| r.session_cookie)
            .map_err(|e| IdentityError::Provider(e.to_string()))
    }

    async fn verify_session(&self, session_cookie: &str) -> Result<VerifiedSession, IdentityError> {
        let response = self
            .client
            .post(format!(
                "{}/v1/sessions:verify?key={}",
                self.base_url, self.api_key
            ))
            .json(&VerifySessionRequest {
                session_cookie,
                check_revoked: true,
            })
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        response
            .json::<VerifiedSession>()
            .await
            .map_err(|e| IdentityError::Provider(e.to_string()))
    }

    async fn revoke_sessions(&self, uid: &str) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(format!(
                "{}/v1/users/{}/sessions:revoke?key={}",
                self.base_url, uid, self.api_key
            ))
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }
        Ok(())
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<String, IdentityError> {
        let response = self
            .client
            .post(format!("{}/v1/users?key={}", self.base_url, self.api_key))
            .json(&CreateUserRequest { email, password })
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        response
            .json::<CreateUserResponse>()
            .await
            .map(|r| r.uid)
            .map_err(|e| IdentityError::Provider(e.to_string()))
    }
}
