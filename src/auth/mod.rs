// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer token authentication for the JobFlex API.
//!
//! ## Auth Flow
//!
//! 1. Frontend authenticates the user with the identity provider
//! 2. Frontend sends `Authorization: Bearer <access token>`
//! 3. Gateway:
//!    - Resolves the token's `kid` against the provider's JWKS
//!    - Verifies the RS256 signature, expiry, issuer and optional audience
//!    - Extracts `sub` as the canonical `uid`
//!
//! ## Security
//!
//! - All `/user/*` endpoints require authentication
//! - Only RS256 is accepted; the token's own `alg` never selects a weaker scheme
//! - JWKS is cached with TTL and refetched on key rotation
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod verifier;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::Auth;
pub use jwks::KeyResolver;
pub use verifier::TokenVerifier;
