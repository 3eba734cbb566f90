// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Remote user profile as held by the identity provider.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `app_metadata.registration` value of a fully registered user.
pub const REGISTRATION_COMPLETE: &str = "complete";

const REGISTRATION_KEY: &str = "registration";
const PLAN_KEY: &str = "plan";
const COMPANY_ID_KEY: &str = "companyId";

/// The provider's user record. Fields this service does not use are kept
/// verbatim in `extra` so the profile can be echoed back to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUserProfile {
    #[serde(default)]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_metadata: Option<AppMetadata>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Provider-side key/value store of a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppMetadata(pub Map<String, Value>);

impl AppMetadata {
    pub fn registration(&self) -> Option<&str> {
        self.0.get(REGISTRATION_KEY).and_then(Value::as_str)
    }

    pub fn plan(&self) -> Option<&str> {
        self.0.get(PLAN_KEY).and_then(Value::as_str)
    }

    /// Company id, stored as a number but tolerated as a numeric string.
    pub fn company_id(&self) -> Option<u64> {
        match self.0.get(COMPANY_ID_KEY)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Minimal subset of `app_metadata` keys to change. The provider merges
/// these keys into the stored map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppMetadataPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
    #[serde(rename = "companyId", skip_serializing_if = "Option::is_none")]
    pub company_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
}

impl AppMetadataPatch {
    pub fn registration_complete(company_id: u64) -> Self {
        Self {
            registration: Some(REGISTRATION_COMPLETE.to_string()),
            company_id: Some(company_id),
            plan: None,
        }
    }

    pub fn plan(name: impl Into<String>) -> Self {
        Self {
            plan: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.registration.is_none() && self.company_id.is_none() && self.plan.is_none()
    }
}
