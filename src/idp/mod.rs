// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Provider Integration
//!
//! The gateway's own (machine-to-machine) side of the identity provider:
//!
//! - `credential` - client credentials exchange and the held service token
//! - `refresher` - background re-acquisition of that token
//! - `management` - user record reads and `app_metadata` patches
//! - `profile` - the provider's user record shapes

pub mod credential;
pub mod error;
pub mod management;
pub mod profile;
pub mod refresher;

pub use credential::{ClientCredentials, RefreshSchedule, ServiceCredentialManager};
pub use error::IdpError;
pub use management::ManagementClient;
pub use profile::{AppMetadata, AppMetadataPatch, RemoteUserProfile, REGISTRATION_COMPLETE};
pub use refresher::CredentialRefresher;
