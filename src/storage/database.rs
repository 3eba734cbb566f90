// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded record database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized UserRecord
//! - `companies`: company_id → serialized CompanyRecord
//! - `sequences`: name → last allocated id
//! - `registration_intents`: user_id → serialized RegistrationIntent

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::records::{
    CompanyRecord, IntentStatus, NewRegistration, RegistrationIntent, UserRecord,
};

// =============================================================================
// Table Definitions
// =============================================================================

const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

const COMPANIES: TableDefinition<u64, &[u8]> = TableDefinition::new("companies");

const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

const REGISTRATION_INTENTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("registration_intents");

const COMPANY_SEQUENCE: &str = "company_id";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// RecordDatabase
// =============================================================================

/// Local user/company records and registration intents.
pub struct RecordDatabase {
    db: Database,
}

impl RecordDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(COMPANIES)?;
            let _ = write_txn.open_table(SEQUENCES)?;
            let _ = write_txn.open_table(REGISTRATION_INTENTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap read used by the health probe.
    pub fn check(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(USERS)?;
        Ok(())
    }

    // =========================================================================
    // Registration intents
    // =========================================================================

    /// Record that a registration is starting. An existing intent is returned
    /// unchanged.
    pub fn begin_intent(&self, user_id: &str) -> StorageResult<RegistrationIntent> {
        let write_txn = self.db.begin_write()?;
        let intent = {
            let mut table = write_txn.open_table(REGISTRATION_INTENTS)?;
            let existing = table
                .get(user_id)?
                .map(|value| serde_json::from_slice::<RegistrationIntent>(value.value()))
                .transpose()?;

            match existing {
                Some(intent) => intent,
                None => {
                    let intent = RegistrationIntent::new(user_id);
                    let json = serde_json::to_vec(&intent)?;
                    table.insert(user_id, json.as_slice())?;
                    intent
                }
            }
        };
        write_txn.commit()?;
        Ok(intent)
    }

    pub fn get_intent(&self, user_id: &str) -> StorageResult<Option<RegistrationIntent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REGISTRATION_INTENTS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All intents whose remote step has not been confirmed.
    pub fn pending_intents(&self) -> StorageResult<Vec<RegistrationIntent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REGISTRATION_INTENTS)?;

        let mut pending = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let intent: RegistrationIntent = serde_json::from_slice(value.value())?;
            if intent.status == IntentStatus::Pending {
                pending.push(intent);
            }
        }
        Ok(pending)
    }

    pub fn mark_intent_completed(&self, user_id: &str) -> StorageResult<RegistrationIntent> {
        self.update_intent(user_id, |intent| {
            intent.status = IntentStatus::Completed;
            intent.last_error = None;
        })
    }

    pub fn record_intent_failure(
        &self,
        user_id: &str,
        error: &str,
    ) -> StorageResult<RegistrationIntent> {
        self.update_intent(user_id, |intent| {
            intent.attempts = intent.attempts.saturating_add(1);
            intent.last_error = Some(error.to_string());
        })
    }

    /// Remove an intent. Returns whether one existed.
    pub fn discard_intent(&self, user_id: &str) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(REGISTRATION_INTENTS)?;
            let removed = table.remove(user_id)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn update_intent<F>(&self, user_id: &str, apply: F) -> StorageResult<RegistrationIntent>
    where
        F: FnOnce(&mut RegistrationIntent),
    {
        let write_txn = self.db.begin_write()?;
        let intent = {
            let mut table = write_txn.open_table(REGISTRATION_INTENTS)?;

            // Read existing value and deserialize before mutating
            let existing_bytes = {
                let existing = table
                    .get(user_id)?
                    .ok_or_else(|| StorageError::NotFound(format!("Registration intent {user_id}")))?;
                existing.value().to_vec()
            };

            let mut intent: RegistrationIntent = serde_json::from_slice(&existing_bytes)?;
            apply(&mut intent);
            intent.updated_at = Utc::now();

            let json = serde_json::to_vec(&intent)?;
            table.insert(user_id, json.as_slice())?;
            intent
        };
        write_txn.commit()?;
        Ok(intent)
    }

    // =========================================================================
    // Users and companies
    // =========================================================================

    /// Create the company and the user in one transaction and attach the new
    /// company id to the user's registration intent.
    pub fn create_user_with_company(
        &self,
        user_id: &str,
        registration: &NewRegistration,
    ) -> StorageResult<(UserRecord, CompanyRecord)> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let records = {
            let mut users = write_txn.open_table(USERS)?;
            if users.get(user_id)?.is_some() {
                return Err(StorageError::Conflict(format!("User {user_id}")));
            }

            let mut sequences = write_txn.open_table(SEQUENCES)?;
            let last = sequences
                .get(COMPANY_SEQUENCE)?
                .map(|value| value.value())
                .unwrap_or(0);
            let company_id = last + 1;
            sequences.insert(COMPANY_SEQUENCE, company_id)?;

            let company = CompanyRecord {
                id: company_id,
                company_name: registration.company_name.clone(),
                company_size: registration.company_size,
                created_at: now,
                updated_at: now,
            };
            let mut companies = write_txn.open_table(COMPANIES)?;
            companies.insert(company_id, serde_json::to_vec(&company)?.as_slice())?;

            let user = UserRecord {
                id: user_id.to_string(),
                first_name: registration.first_name.clone(),
                last_name: registration.last_name.clone(),
                company_id,
                created_at: now,
                updated_at: now,
            };
            users.insert(user_id, serde_json::to_vec(&user)?.as_slice())?;

            let mut intents = write_txn.open_table(REGISTRATION_INTENTS)?;
            let existing = intents
                .get(user_id)?
                .map(|value| serde_json::from_slice::<RegistrationIntent>(value.value()))
                .transpose()?;
            let mut intent = existing.unwrap_or_else(|| RegistrationIntent::new(user_id));
            intent.company_id = Some(company_id);
            intent.updated_at = now;
            intents.insert(user_id, serde_json::to_vec(&intent)?.as_slice())?;

            (user, company)
        };
        write_txn.commit()?;
        Ok(records)
    }

    pub fn get_user(&self, user_id: &str) -> StorageResult<Option<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_company(&self, company_id: u64) -> StorageResult<Option<CompanyRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COMPANIES)?;
        match table.get(company_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}
