// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Management API Client
//!
//! Reads and patches user records at the identity provider, authenticated
//! with the service credential.
//!
//! - `read`: `GET <issuer>api/v2/users/{id}`
//! - `update`: `PATCH <issuer>api/v2/users/{id}` with `{"app_metadata": {..}}`
//!
//! The provider merges `app_metadata` keys; the client sends only the changed
//! subset and never merges locally.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::credential::ServiceCredentialManager;
use super::error::IdpError;
use super::profile::{AppMetadataPatch, RemoteUserProfile};
use crate::config::IdpConfig;

#[derive(Serialize)]
struct UpdateBody<'a> {
    app_metadata: &'a AppMetadataPatch,
}

pub struct ManagementClient {
    /// `<issuer>api/v2/`
    base_url: Url,
    credentials: Arc<ServiceCredentialManager>,
    http: reqwest::Client,
}

impl ManagementClient {
    pub fn new(
        base_url: Url,
        credentials: Arc<ServiceCredentialManager>,
        timeout: Duration,
    ) -> Result<Self, IdpError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdpError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            credentials,
            http,
        })
    }

    pub fn from_config(
        config: &IdpConfig,
        credentials: Arc<ServiceCredentialManager>,
    ) -> Result<Self, IdpError> {
        Self::new(config.management_base_url(), credentials, config.http_timeout)
    }

    pub fn credentials(&self) -> &ServiceCredentialManager {
        &self.credentials
    }

    /// Fetch a user's remote profile.
    pub async fn read(&self, user_id: &str) -> Result<RemoteUserProfile, IdpError> {
        let url = self.user_url(user_id)?;
        let token = self.credentials.bearer().await?;

        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| IdpError::Transport(format!("GET user failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = IdpError::Upstream {
                status: status.as_u16(),
                body,
            };
            self.note_rejection(&err).await;
            return Err(err);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| IdpError::Transport(format!("GET user body failed: {e}")))?;
        serde_json::from_slice(&bytes).map_err(|e| IdpError::MalformedResponse(e.to_string()))
    }

    /// Patch a subset of the user's `app_metadata`.
    pub async fn update(
        &self,
        user_id: &str,
        patch: &AppMetadataPatch,
    ) -> Result<RemoteUserProfile, IdpError> {
        if patch.is_empty() {
            return Err(IdpError::InvalidRequest("empty app_metadata patch".to_string()));
        }
        let url = self.user_url(user_id)?;
        let token = self.credentials.bearer().await?;

        let response = self
            .http
            .patch(url)
            .bearer_auth(&token)
            .json(&UpdateBody {
                app_metadata: patch,
            })
            .send()
            .await
            .map_err(|e| IdpError::RemoteUpdateFailed {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = IdpError::RemoteUpdateFailed {
                status: Some(status.as_u16()),
                message: format!("PATCH user returned {status}: {body}"),
            };
            self.note_rejection(&err).await;
            return Err(err);
        }

        let bytes = response.bytes().await.map_err(|e| IdpError::RemoteUpdateFailed {
            status: Some(status.as_u16()),
            message: format!("PATCH user body failed: {e}"),
        })?;
        let profile: RemoteUserProfile = serde_json::from_slice(&bytes)
            .map_err(|e| IdpError::MalformedResponse(e.to_string()))?;

        debug!(user_id = %user_id, "Patched remote app_metadata");
        Ok(profile)
    }

    /// `<base>users/<percent-encoded id>`
    fn user_url(&self, user_id: &str) -> Result<Url, IdpError> {
        if user_id.trim().is_empty() {
            return Err(IdpError::InvalidRequest("empty user id".to_string()));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IdpError::InvalidRequest("management URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push("users")
            .push(user_id);
        Ok(url)
    }

    async fn note_rejection(&self, err: &IdpError) {
        if err.is_credential_rejection() {
            warn!("Management API rejected the service credential");
            self.credentials.invalidate().await;
        }
    }
}
