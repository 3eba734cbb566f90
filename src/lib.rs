// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JobFlex Server - Identity Gateway
//!
//! Verifies end-user bearer tokens against the identity provider's key set,
//! holds a service credential for the provider's management API, and gates
//! callers on the registration and plan state kept in their remote profile.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification (JWKS, RS256)
//! - `idp` - Service credential and management API client
//! - `gate` - Registration and plan gating
//! - `storage` - Local user and company records (redb)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod idp;
pub mod logging;
pub mod models;
pub mod state;
pub mod storage;

#[cfg(test)]
pub(crate) mod testutil;
