// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors of the service credential and the management API client.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdpError {
    /// No usable service credential is held; the call was not attempted.
    #[error("service credential is missing or expired")]
    ServiceUnauthenticated,

    #[error("client credentials exchange failed: {0}")]
    TokenExchange(String),

    #[error("identity provider request failed: {0}")]
    Transport(String),

    #[error("identity provider returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("identity provider response was invalid: {0}")]
    MalformedResponse(String),

    #[error("remote profile update failed: {message}")]
    RemoteUpdateFailed { status: Option<u16>, message: String },

    #[error("invalid management request: {0}")]
    InvalidRequest(String),
}

impl IdpError {
    /// Whether the provider rejected the service credential itself.
    pub fn is_credential_rejection(&self) -> bool {
        matches!(
            self,
            IdpError::Upstream { status: 401, .. }
                | IdpError::RemoteUpdateFailed {
                    status: Some(401),
                    ..
                }
        )
    }
}
