// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token verification errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Reasons a bearer token is rejected.
///
/// Every variant terminates request handling with `401 Unauthorized`; the
/// `error_code` lets clients tell a stale token from an outage at the
/// identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No token in the Authorization header
    #[error("Authorization token is required")]
    MissingToken,

    /// Header present but not readable
    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,

    /// Token is not a decodable JWT
    #[error("Token is malformed")]
    MalformedToken,

    /// Header names an algorithm other than RS256
    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key set could not be fetched or parsed
    #[error("Signing key set unavailable: {0}")]
    KeySetUnavailable(String),

    /// No key in the key set matches the token's `kid`
    #[error("No signing key matches key id `{0}`")]
    KeyNotFound(String),

    /// Key set entry exists but cannot be used for verification
    #[error("Signing key is unusable: {0}")]
    InvalidKey(String),

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token is not yet valid")]
    NotYetValid,

    #[error("Token issuer is invalid")]
    InvalidIssuer,

    #[error("Token audience is invalid")]
    InvalidAudience,

    /// `sub` claim missing or empty
    #[error("Token has no subject")]
    MissingSubject,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::KeySetUnavailable(_) => "key_set_unavailable",
            AuthError::KeyNotFound(_) => "key_not_found",
            AuthError::InvalidKey(_) => "invalid_key",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "token_expired",
            AuthError::NotYetValid => "token_not_yet_valid",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::MissingSubject => "missing_subject",
        }
    }

    /// Whether the failure happened while resolving the verification key.
    pub fn is_key_resolution_failure(&self) -> bool {
        matches!(
            self,
            AuthError::KeySetUnavailable(_) | AuthError::KeyNotFound(_) | AuthError::InvalidKey(_)
        )
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
