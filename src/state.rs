// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use thiserror::Error;

use crate::auth::{AuthError, KeyResolver, TokenVerifier};
use crate::config::IdpConfig;
use crate::gate::AuthorizationGate;
use crate::idp::{IdpError, ManagementClient, ServiceCredentialManager};
use crate::storage::RecordDatabase;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("key resolver: {0}")]
    Auth(#[from] AuthError),
    #[error("identity provider client: {0}")]
    Idp(#[from] IdpError),
}

/// Components shared by every request. Built once at startup and passed to
/// the router; nothing here is a global.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<TokenVerifier>,
    pub keys: Arc<KeyResolver>,
    pub credentials: Arc<ServiceCredentialManager>,
    pub gate: Arc<AuthorizationGate>,
    pub records: Arc<RecordDatabase>,
}

impl AppState {
    /// Wire the components for one identity provider. The service credential
    /// starts empty; see [`ServiceCredentialManager::initialize`].
    pub fn from_config(config: &IdpConfig, records: Arc<RecordDatabase>) -> Result<Self, StateError> {
        let keys = Arc::new(
            KeyResolver::with_timeout(config.jwks_url().as_str(), config.http_timeout)?
                .with_cache_ttl(config.jwks_cache_ttl)
                .with_min_refresh_interval(config.jwks_min_refresh),
        );

        let mut verifier = TokenVerifier::new(Arc::clone(&keys)).with_issuer(config.issuer.as_str());
        if let Some(ref audience) = config.api_audience {
            verifier = verifier.with_audience(audience.clone());
        }

        let credentials = Arc::new(ServiceCredentialManager::from_config(config)?);
        let directory = Arc::new(ManagementClient::from_config(config, Arc::clone(&credentials))?);
        let gate = Arc::new(AuthorizationGate::new(directory, Arc::clone(&records)));

        Ok(Self {
            verifier: Arc::new(verifier),
            keys,
            credentials,
            gate,
            records,
        })
    }
}
