// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Service Credential
//!
//! Machine-to-machine access token the gateway uses to call the identity
//! provider's management API on its own behalf. It is never an end-user
//! token and never leaves the process.
//!
//! ## Lifecycle
//!
//! 1. Exchanged once at startup (`client_credentials` grant)
//! 2. Held as an immutable snapshot; readers clone the `Arc`
//! 3. Re-acquired by [`super::CredentialRefresher`] before expiry, or after
//!    the provider rejects it
//!
//! A missing or expired credential blocks every management call with
//! [`IdpError::ServiceUnauthenticated`]; requests never fall back to an
//! unauthenticated call and never trigger an exchange themselves.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use url::Url;

use super::error::IdpError;
use crate::config::IdpConfig;

/// Re-acquire this long before the credential expires, capped at half the
/// credential's lifetime.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

const GRANT_TYPE: &str = "client_credentials";

/// Client identity used in the exchange.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub audience: String,
    pub token_url: Url,
}

impl ClientCredentials {
    pub fn from_config(config: &IdpConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            audience: config.management_audience.clone(),
            token_url: config.token_url(),
        }
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
    grant_type: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// One issued service token.
pub struct ServiceCredential {
    access_token: String,
    pub token_type: String,
    pub expires_at: Option<Instant>,
    /// Lifetime reported at issue time
    pub lifetime: Option<Duration>,
}

impl ServiceCredential {
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| Instant::now() >= at)
            .unwrap_or(false)
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredential")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// When the refresher should act next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSchedule {
    /// No usable credential is held.
    Missing,
    /// Re-acquire after this delay.
    After(Duration),
    /// The provider did not report an expiry.
    NoExpiry,
}

/// Holds the process-wide service credential.
pub struct ServiceCredentialManager {
    credentials: ClientCredentials,
    current: RwLock<Option<Arc<ServiceCredential>>>,
    /// Serialises exchanges
    exchange_lock: Mutex<()>,
    http: reqwest::Client,
}

impl ServiceCredentialManager {
    pub fn new(credentials: ClientCredentials, timeout: Duration) -> Result<Self, IdpError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdpError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            credentials,
            current: RwLock::new(None),
            exchange_lock: Mutex::new(()),
            http,
        })
    }

    pub fn from_config(config: &IdpConfig) -> Result<Self, IdpError> {
        Self::new(ClientCredentials::from_config(config), config.http_timeout)
    }

    /// Exchange the client credentials and replace the held snapshot.
    ///
    /// On failure the previous snapshot is left untouched.
    pub async fn acquire(&self) -> Result<Arc<ServiceCredential>, IdpError> {
        let _guard = self.exchange_lock.lock().await;

        let body = TokenRequest {
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
            audience: &self.credentials.audience,
            grant_type: GRANT_TYPE,
        };

        let response = self
            .http
            .post(self.credentials.token_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| IdpError::TokenExchange(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IdpError::TokenExchange(format!(
                "token request returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdpError::TokenExchange(format!("invalid token response: {e}")))?;

        if token.access_token.trim().is_empty() {
            return Err(IdpError::TokenExchange(
                "token response did not include access_token".to_string(),
            ));
        }

        let lifetime = token.expires_in.map(Duration::from_secs);
        // A lifetime past the clock's range is treated as no expiry.
        let expires_at = lifetime.and_then(|d| Instant::now().checked_add(d));
        let credential = Arc::new(ServiceCredential {
            access_token: token.access_token,
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at,
            lifetime: expires_at.and(lifetime),
        });

        *self.current.write().await = Some(Arc::clone(&credential));
        info!(
            audience = %self.credentials.audience,
            expires_in_secs = ?token.expires_in,
            "Acquired service credential"
        );
        Ok(credential)
    }

    /// Startup exchange. Failure is logged and leaves the holder empty.
    pub async fn initialize(&self) -> bool {
        match self.acquire().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Service credential unavailable; management calls will fail closed");
                false
            }
        }
    }

    /// Current credential if present and not expired.
    pub async fn current(&self) -> Option<Arc<ServiceCredential>> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|credential| !credential.is_expired())
            .cloned()
    }

    /// The access token to present to the management API.
    pub async fn bearer(&self) -> Result<String, IdpError> {
        self.current()
            .await
            .map(|credential| credential.access_token.clone())
            .ok_or(IdpError::ServiceUnauthenticated)
    }

    pub async fn is_available(&self) -> bool {
        self.current().await.is_some()
    }

    /// Drop the held credential, e.g. after the provider rejected it.
    pub async fn invalidate(&self) {
        if self.current.write().await.take().is_some() {
            warn!("Service credential invalidated");
        }
    }

    pub async fn refresh_schedule(&self) -> RefreshSchedule {
        let Some(credential) = self.current().await else {
            return RefreshSchedule::Missing;
        };
        match credential.expires_at {
            Some(at) => {
                let remaining = at.saturating_duration_since(Instant::now());
                let margin = credential
                    .lifetime
                    .map_or(REFRESH_MARGIN, |lifetime| {
                        REFRESH_MARGIN.min(lifetime / 2)
                    });
                RefreshSchedule::After(remaining.saturating_sub(margin))
            }
            None => RefreshSchedule::NoExpiry,
        }
    }

    #[cfg(test)]
    pub(crate) async fn install(&self, access_token: &str, expires_in: Option<Duration>) {
        self.install_with_lifetime(access_token, expires_in, expires_in)
            .await;
    }

    /// Install a credential with `expires_in` left of an original `lifetime`.
    #[cfg(test)]
    pub(crate) async fn install_with_lifetime(
        &self,
        access_token: &str,
        expires_in: Option<Duration>,
        lifetime: Option<Duration>,
    ) {
        *self.current.write().await = Some(Arc::new(ServiceCredential {
            access_token: access_token.to_string(),
            token_type: "Bearer".to_string(),
            expires_at: expires_in.map(|d| Instant::now() + d),
            lifetime,
        }));
    }
}
