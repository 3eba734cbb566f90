// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims body of an end-user access token.
///
/// Only `sub` is required; temporal claims are validated by the verifier when
/// present. Provider-managed metadata beyond these fields is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Subject - the user's stable identity at the provider
    pub sub: String,

    #[serde(default)]
    pub iss: Option<String>,

    /// String or array, depending on the provider
    #[serde(default)]
    pub aud: Option<serde_json::Value>,

    #[serde(default)]
    pub exp: Option<i64>,

    #[serde(default)]
    pub nbf: Option<i64>,

    #[serde(default)]
    pub iat: Option<i64>,

    /// Authorized party (client the token was issued to)
    #[serde(default)]
    pub azp: Option<String>,

    /// Space separated granted scopes
    #[serde(default)]
    pub scope: Option<String>,
}

/// Authenticated identity attached to a request.
///
/// This is the request-scoped `uid` context: it exists only after a token has
/// been fully verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    #[serde(rename = "uid")]
    pub user_id: String,

    #[serde(skip)]
    pub issuer: Option<String>,

    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: TokenClaims) -> Self {
        let scopes = claims
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Self {
            user_id: claims.sub,
            issuer: claims.iss,
            expires_at: claims.exp,
            scopes,
        }
    }
}
