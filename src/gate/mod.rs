// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorization Gate
//!
//! Request-time registration/subscription policy, read from the user's
//! remote `app_metadata`:
//!
//! ```text
//! Unregistered --complete_registration--> Registered --select_plan--> Registered+Plan
//! ```
//!
//! Transitions only ever add keys. `select_plan` is not ordered after
//! registration.
//!
//! ## Registration saga
//!
//! 1. Record a pending intent
//! 2. Create company and user locally (one transaction)
//! 3. Patch `app_metadata = {registration, companyId}` remotely
//! 4. Mark the intent completed
//!
//! A failure at step 3 leaves the intent pending and surfaces
//! [`GateError::PartiallyRegistered`]. Calling `complete_registration` again,
//! or [`AuthorizationGate::reconcile_pending`] at startup, resumes at step 3.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::idp::{
    AppMetadata, AppMetadataPatch, IdpError, ManagementClient, RemoteUserProfile,
    REGISTRATION_COMPLETE,
};
use crate::models::RegisterRequest;
use crate::storage::{CompanyRecord, RecordDatabase, StorageError, UserRecord};

/// Derived per request; never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDecision {
    pub registered: bool,
    pub paid_plan: bool,
}

impl AuthorizationDecision {
    pub fn from_metadata(metadata: Option<&AppMetadata>) -> Self {
        let Some(metadata) = metadata else {
            return Self::default();
        };
        Self {
            registered: metadata.registration() == Some(REGISTRATION_COMPLETE),
            paid_plan: metadata.plan().is_some_and(|plan| !plan.is_empty()),
        }
    }

    pub fn from_profile(profile: &RemoteUserProfile) -> Self {
        Self::from_metadata(profile.app_metadata.as_ref())
    }

    pub fn is_allowed(&self) -> bool {
        self.registered && self.paid_plan
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("user {0} is already registered")]
    AlreadyRegistered(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] IdpError),

    /// Local records exist but the identity provider was not updated.
    #[error("user {user_id} registered locally (company {company_id}) but the remote profile was not updated: {source}")]
    PartiallyRegistered {
        user_id: String,
        company_id: u64,
        #[source]
        source: IdpError,
    },
}

#[derive(Debug, Clone)]
pub struct CompletedRegistration {
    pub user: UserRecord,
    pub company: CompanyRecord,
    pub profile: RemoteUserProfile,
}

/// Outcome of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub completed: usize,
    pub discarded: usize,
    pub failed: usize,
}

pub struct AuthorizationGate {
    directory: Arc<ManagementClient>,
    records: Arc<RecordDatabase>,
}

impl AuthorizationGate {
    pub fn new(directory: Arc<ManagementClient>, records: Arc<RecordDatabase>) -> Self {
        Self { directory, records }
    }

    /// Read the user's gating flags. Any failure reads as "not registered,
    /// no plan".
    pub async fn check_registration(&self, user_id: &str) -> AuthorizationDecision {
        match self.directory.read(user_id).await {
            Ok(profile) => AuthorizationDecision::from_profile(&profile),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Profile read failed; treating user as unregistered");
                AuthorizationDecision::default()
            }
        }
    }

    pub async fn complete_registration(
        &self,
        user_id: &str,
        request: &RegisterRequest,
    ) -> Result<CompletedRegistration, GateError> {
        let registration = request.validate().map_err(GateError::InvalidPayload)?;

        let intent = self.records.begin_intent(user_id)?;
        if intent.is_completed() {
            return Err(GateError::AlreadyRegistered(user_id.to_string()));
        }

        let (user, company) = match intent.company_id {
            // Local write already committed by an earlier attempt.
            Some(company_id) => {
                let user = self
                    .records
                    .get_user(user_id)?
                    .ok_or_else(|| StorageError::NotFound(format!("User {user_id}")))?;
                let company = self
                    .records
                    .get_company(company_id)?
                    .ok_or_else(|| StorageError::NotFound(format!("Company {company_id}")))?;
                info!(user_id = %user_id, company_id, attempts = intent.attempts, "Resuming registration");
                (user, company)
            }
            None => match self.records.create_user_with_company(user_id, &registration) {
                Ok(records) => records,
                Err(StorageError::Conflict(_)) => {
                    return Err(GateError::AlreadyRegistered(user_id.to_string()))
                }
                Err(e) => return Err(e.into()),
            },
        };

        let profile = self.finish_remote(user_id, company.id).await?;
        info!(user_id = %user_id, company_id = company.id, "Registration completed");
        Ok(CompletedRegistration {
            user,
            company,
            profile,
        })
    }

    /// Record the chosen plan. Any non-empty name is accepted.
    pub async fn select_plan(
        &self,
        user_id: &str,
        plan: &str,
    ) -> Result<RemoteUserProfile, GateError> {
        let plan = plan.trim();
        if plan.is_empty() {
            return Err(GateError::InvalidPayload("plan is required".to_string()));
        }
        let profile = self
            .directory
            .update(user_id, &AppMetadataPatch::plan(plan))
            .await?;
        info!(user_id = %user_id, plan = %plan, "Plan selected");
        Ok(profile)
    }

    /// Re-drive every pending registration intent.
    pub async fn reconcile_pending(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let pending = match self.records.pending_intents() {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "Could not list pending registrations");
                return report;
            }
        };

        for intent in pending {
            match intent.company_id {
                None => match self.records.discard_intent(&intent.user_id) {
                    Ok(_) => report.discarded += 1,
                    Err(e) => {
                        warn!(user_id = %intent.user_id, error = %e, "Could not discard registration intent");
                        report.failed += 1;
                    }
                },
                Some(company_id) => match self.finish_remote(&intent.user_id, company_id).await {
                    Ok(_) => report.completed += 1,
                    Err(_) => report.failed += 1,
                },
            }
        }

        if report != ReconcileReport::default() {
            info!(
                completed = report.completed,
                discarded = report.discarded,
                failed = report.failed,
                "Reconciled pending registrations"
            );
        }
        report
    }

    /// Steps 3 and 4 of the saga.
    async fn finish_remote(
        &self,
        user_id: &str,
        company_id: u64,
    ) -> Result<RemoteUserProfile, GateError> {
        let patch = AppMetadataPatch::registration_complete(company_id);
        match self.directory.update(user_id, &patch).await {
            Ok(profile) => {
                self.records.mark_intent_completed(user_id)?;
                Ok(profile)
            }
            Err(source) => {
                warn!(
                    user_id = %user_id,
                    company_id,
                    error = %source,
                    "Remote registration patch failed; local and remote state diverge"
                );
                if let Err(e) = self.records.record_intent_failure(user_id, &source.to_string()) {
                    warn!(user_id = %user_id, error = %e, "Could not record registration failure");
                }
                Err(GateError::PartiallyRegistered {
                    user_id: user_id.to_string(),
                    company_id,
                    source,
                })
            }
        }
    }
}
