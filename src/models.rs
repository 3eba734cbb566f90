// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the `/user` endpoints. All types derive
//! `ToSchema` for the OpenAPI document.
//!
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::gate::AuthorizationDecision;
use crate::idp::RemoteUserProfile;
use crate::storage::{CompanyRecord, NewRegistration, UserRecord};

// =============================================================================
// Registration status
// =============================================================================

/// Query of `GET /user/registration`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RegistrationQuery {
    /// User to check; defaults to the token subject.
    pub uid: Option<String>,
}

/// Gating payload returned when a caller may not proceed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatingError {
    /// Always 403
    pub code: u16,
    pub registered: bool,
    pub paid_plan: bool,
}

/// `{"success":true}` or `{"error":{"code":403,"registered":..,"paidPlan":..}}`.
///
/// Both shapes are sent with HTTP 200 so clients can pick the next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RegistrationStatusResponse {
    Allowed { success: bool },
    Gated { error: GatingError },
}

impl From<AuthorizationDecision> for RegistrationStatusResponse {
    fn from(decision: AuthorizationDecision) -> Self {
        if decision.is_allowed() {
            RegistrationStatusResponse::Allowed { success: true }
        } else {
            RegistrationStatusResponse::Gated {
                error: GatingError {
                    code: 403,
                    registered: decision.registered,
                    paid_plan: decision.paid_plan,
                },
            }
        }
    }
}

// =============================================================================
// Registration
// =============================================================================

/// Body of `POST /user/register`.
///
/// Missing fields deserialize as empty so that validation can name them.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub company_name: String,
    /// Number, or a string holding a number
    #[serde(default)]
    #[schema(value_type = u32)]
    pub company_size: Option<Value>,
}

impl RegisterRequest {
    /// Check required fields and normalise the payload.
    pub fn validate(&self) -> Result<NewRegistration, String> {
        let first_name = required("firstName", &self.first_name)?;
        let last_name = required("lastName", &self.last_name)?;
        let company_name = required("companyName", &self.company_name)?;

        let company_size = match &self.company_size {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            None | Some(Value::Null) => return Err("companySize is required".to_string()),
            Some(_) => None,
        }
        .and_then(|size| u32::try_from(size).ok())
        .ok_or_else(|| "companySize must be a non-negative integer".to_string())?;

        Ok(NewRegistration {
            first_name,
            last_name,
            company_name,
            company_size,
        })
    }
}

fn required(name: &str, value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(format!("{name} is required"))
    } else {
        Ok(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub success: bool,
    pub user: UserRecord,
    pub company: CompanyRecord,
}

// =============================================================================
// Plan selection
// =============================================================================

/// Body of `POST /user/plan`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PlanRequest {
    #[serde(default)]
    pub plan: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlanResponse {
    pub success: bool,
    /// Remote profile after the patch
    #[schema(value_type = Object)]
    pub user: RemoteUserProfile,
}
