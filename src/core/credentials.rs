//! Short-lived credential exchange.
//!
//! The realtime endpoint is never opened with the caller's long-lived API
//! key. The broker performs exactly one HTTP round trip to exchange it for a
//! time-boxed session token, and classifies upstream failures into the
//! stable [`SynthesisError`] taxonomy. The long-lived key is neither logged
//! nor stored beyond the call.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::config::SessionConfig;
use crate::errors::{SessionResult, SynthesisError};

/// Time-boxed authorization token for a single synthesis session.
///
/// Owned exclusively by the session that requested it; never persisted or
/// reused across calls. Expiry is observed provider-side, not enforced
/// locally.
#[derive(Clone)]
pub struct SessionCredential {
    pub token: String,
    pub expires_at_epoch: i64,
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("token", &"<redacted>")
            .field("expires_at_epoch", &self.expires_at_epoch)
            .finish()
    }
}

/// Seam between the session and whatever supplies its credential.
///
/// The production implementation is [`CredentialBroker`]; tests substitute a
/// stub so protocol behavior can be exercised without the exchange.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Exchange a long-lived API key for a short-lived session credential.
    async fn exchange(&self, api_key: &str) -> SessionResult<SessionCredential>;
}

/// HTTP client for the provider's session-credential endpoint.
pub struct CredentialBroker {
    client: reqwest::Client,
    sessions_url: Url,
    model: String,
    ttl_secs: u64,
    timeout: std::time::Duration,
}

impl CredentialBroker {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            sessions_url: config.sessions_url.clone(),
            model: config.model.clone(),
            ttl_secs: config.credential_ttl_secs,
            timeout: config.exchange_timeout,
        }
    }
}

#[async_trait]
impl TokenSource for CredentialBroker {
    async fn exchange(&self, api_key: &str) -> SessionResult<SessionCredential> {
        debug!(url = %self.sessions_url, "exchanging API key for session credential");

        let body = json!({
            "model": self.model,
            "expires_in": self.ttl_secs,
        });

        let response = self
            .client
            .post(self.sessions_url.clone())
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                SynthesisError::UpstreamUnavailable(format!("credential exchange failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, detail));
        }

        let parsed: SessionCreateResponse = response.json().await.map_err(|e| {
            SynthesisError::UpstreamUnavailable(format!("malformed credential response: {e}"))
        })?;

        match parsed.client_secret {
            Some(secret) if !secret.value.is_empty() => {
                debug!(expires_at = secret.expires_at, "session credential obtained");
                Ok(SessionCredential {
                    token: secret.value,
                    expires_at_epoch: secret.expires_at,
                })
            }
            _ => Err(SynthesisError::MissingCredential),
        }
    }
}

/// Map an HTTP failure status onto the error taxonomy.
fn classify_status(status: StatusCode, detail: String) -> SynthesisError {
    let detail = if detail.is_empty() {
        status.to_string()
    } else {
        detail
    };
    match status {
        StatusCode::UNAUTHORIZED => SynthesisError::InvalidCredential(detail),
        StatusCode::PAYMENT_REQUIRED => SynthesisError::PaymentRequired(detail),
        StatusCode::FORBIDDEN => SynthesisError::PermissionDenied(detail),
        StatusCode::TOO_MANY_REQUESTS => SynthesisError::RateLimited(detail),
        _ => SynthesisError::UpstreamUnavailable(format!(
            "credential endpoint returned {status}: {detail}"
        )),
    }
}

#[derive(Debug, Deserialize)]
struct SessionCreateResponse {
    #[serde(default)]
    client_secret: Option<ClientSecret>,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    #[serde(default)]
    value: String,
    #[serde(default)]
    expires_at: i64,
}
