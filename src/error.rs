// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::gate::GateError;
use crate::idp::IdpError;
use crate::storage::StorageError;

/// Generic failure payload of the HTTP surface.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn service_unauthenticated() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "service_unauthenticated",
            "Identity provider credential unavailable",
        )
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "identity_provider_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code,
        });
        (self.status, body).into_response()
    }
}

impl From<IdpError> for ApiError {
    fn from(err: IdpError) -> Self {
        match err {
            IdpError::ServiceUnauthenticated => ApiError::service_unauthenticated(),
            IdpError::InvalidRequest(message) => ApiError::bad_request(message),
            other => ApiError::bad_gateway(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        error!(error = %err, "Storage failure");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            "Local storage failure",
        )
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::InvalidPayload(message) => ApiError::bad_request(message),
            GateError::AlreadyRegistered(user_id) => {
                ApiError::conflict(format!("User {user_id} is already registered"))
            }
            GateError::Storage(e) => e.into(),
            GateError::Remote(e) => e.into(),
            partial @ GateError::PartiallyRegistered { .. } => ApiError::new(
                StatusCode::BAD_GATEWAY,
                "partial_registration",
                partial.to_string(),
            ),
        }
    }
}
