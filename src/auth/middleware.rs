// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Applied to a router subtree with
//! `axum::middleware::from_fn_with_state(state, require_auth)`. On success the
//! verified [`AuthenticatedUser`] is stored in the request extensions before
//! the handler runs; on failure the request ends with `401` and the handler
//! never executes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::extractor::bearer_token;
use crate::state::AppState;

/// Authentication middleware function.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let token = match bearer_token(request.headers()) {
        Ok(token) => token,
        Err(e) => return e.into_response(),
    };

    match state.verifier.verify(token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            debug!(
                path = %request.uri().path(),
                error_code = e.error_code(),
                "Request rejected by token verification"
            );
            e.into_response()
        }
    }
}
