// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Local Record Storage
//!
//! Users, companies and registration intents in an embedded redb database.
//! Business tables beyond what registration needs live elsewhere.

pub mod database;
pub mod records;

pub use database::{RecordDatabase, StorageError, StorageResult};
pub use records::{
    CompanyRecord, IntentStatus, NewRegistration, RegistrationIntent, UserRecord,
};
