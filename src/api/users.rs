// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User registration endpoints.
//!
//! All routes sit behind [`crate::auth::middleware::require_auth`]; the
//! caller's identity is the verified token subject.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use tracing::info;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::{
    PlanRequest, PlanResponse, RegisterRequest, RegisterResponse, RegistrationQuery,
    RegistrationStatusResponse,
};
use crate::state::AppState;

/// Check whether the caller may proceed past registration and plan gating.
///
/// Gating outcomes are reported with HTTP 200 so the client can render the
/// next step.
#[utoipa::path(
    get,
    path = "/user/registration",
    tag = "User",
    params(RegistrationQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Gating decision", body = RegistrationStatusResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "uid does not match the token subject")
    )
)]
pub async fn check_registration(
    State(state): State<AppState>,
    Auth(user): Auth,
    Query(query): Query<RegistrationQuery>,
) -> Result<Json<RegistrationStatusResponse>, ApiError> {
    let uid = query
        .uid
        .as_deref()
        .map(str::trim)
        .filter(|uid| !uid.is_empty())
        .unwrap_or(&user.user_id);

    if uid != user.user_id {
        return Err(ApiError::forbidden("uid does not match the authenticated user"));
    }

    let decision = state.gate.check_registration(uid).await;
    Ok(Json(decision.into()))
}

/// Create the caller's local user and company, then mark the remote profile
/// as registered.
#[utoipa::path(
    post,
    path = "/user/register",
    tag = "User",
    request_body = RegisterRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Registration completed", body = RegisterResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 409, description = "Already registered"),
        (status = 502, description = "Local records created but the remote profile was not updated"),
        (status = 503, description = "Service credential unavailable")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Auth(user): Auth,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let completed = state
        .gate
        .complete_registration(&user.user_id, &request)
        .await?;

    info!(user_id = %user.user_id, company_id = completed.company.id, "User registered");
    Ok(Json(RegisterResponse {
        success: true,
        user: completed.user,
        company: completed.company,
    }))
}

/// Record the caller's selected plan on the remote profile.
#[utoipa::path(
    post,
    path = "/user/plan",
    tag = "User",
    request_body = PlanRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Plan recorded", body = PlanResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 502, description = "Identity provider error"),
        (status = 503, description = "Service credential unavailable")
    )
)]
pub async fn select_plan(
    State(state): State<AppState>,
    Auth(user): Auth,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<PlanResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let profile = state.gate.select_plan(&user.user_id, &request.plan).await?;
    Ok(Json(PlanResponse {
        success: true,
        user: profile,
    }))
}
