// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! ## Steps
//!
//! 1. Reject absent or empty tokens
//! 2. Read `kid` and `alg` from the header; only RS256 is accepted
//! 3. Resolve the verification key through the [`KeyResolver`]
//! 4. Verify the signature, `exp`/`nbf` when present, `iss` and (optionally) `aud`
//! 5. Return the subject as an [`AuthenticatedUser`]
//!
//! Verification is all-or-nothing: callers either get a validated identity
//! or the rejection reason.

use std::collections::HashSet;
use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::debug;

use super::claims::{AuthenticatedUser, TokenClaims};
use super::error::AuthError;
use super::jwks::KeyResolver;

/// The single accepted signing scheme.
pub const ACCEPTED_ALGORITHM: Algorithm = Algorithm::RS256;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Verifies end-user tokens issued by one identity provider.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: Arc<KeyResolver>,
    /// Expected issuer
    issuer: Option<String>,
    /// Expected audience (optional)
    audience: Option<String>,
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeyResolver>) -> Self {
        Self {
            keys,
            issuer: None,
            audience: None,
        }
    }

    /// Set the expected issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set the expected audience.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Validate a raw token and return the authenticated subject.
    pub async fn verify(&self, raw_token: &str) -> Result<AuthenticatedUser, AuthError> {
        let token = raw_token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        if header.alg != ACCEPTED_ALGORITHM {
            return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        let kid = header
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| AuthError::KeyNotFound("<none>".to_string()))?;
        let key = self.keys.resolve(kid).await?;

        let validation = self.validation();
        let token_data = decode::<TokenClaims>(token, key.decoding_key(), &validation)
            .map_err(|e| map_jwt_error(e.kind()))?;

        let claims = token_data.claims;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }

        debug!(kid = %kid, user_id = %claims.sub, "Token verified");
        Ok(AuthenticatedUser::from_claims(claims))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(ACCEPTED_ALGORITHM);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // exp/nbf are checked only when present; the subject is mandatory.
        validation.required_spec_claims = HashSet::from(["sub".to_string()]);

        if let Some(ref issuer) = self.issuer {
            validation.set_issuer(&[issuer]);
        }

        if let Some(ref audience) = self.audience {
            validation.set_audience(&[audience]);
        } else {
            validation.validate_aud = false;
        }
        validation
    }
}

fn map_jwt_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::ImmatureSignature => AuthError::NotYetValid,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidAlgorithm => AuthError::UnsupportedAlgorithm("mismatched key".to_string()),
        ErrorKind::MissingRequiredClaim(_) => AuthError::MissingSubject,
        ErrorKind::InvalidKeyFormat => AuthError::InvalidKey("invalid key format".to_string()),
        _ => AuthError::MalformedToken,
    }
}
