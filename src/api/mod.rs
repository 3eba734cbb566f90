// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::middleware::require_auth,
    gate::AuthorizationDecision,
    models::{
        GatingError, PlanRequest, PlanResponse, RegisterRequest, RegisterResponse,
        RegistrationStatusResponse,
    },
    state::AppState,
    storage::{CompanyRecord, UserRecord},
};

pub mod health;
pub mod users;

pub fn router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/registration", get(users::check_registration))
        .route("/register", post(users::register))
        .route("/plan", post(users::select_plan))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/user", user_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "start" }))
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        users::check_registration,
        users::register,
        users::select_plan
    ),
    components(
        schemas(
            AuthorizationDecision,
            GatingError,
            RegistrationStatusResponse,
            RegisterRequest,
            RegisterResponse,
            PlanRequest,
            PlanResponse,
            UserRecord,
            CompanyRecord,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "User", description = "Registration and plan gating")
    )
)]
struct ApiDoc;
