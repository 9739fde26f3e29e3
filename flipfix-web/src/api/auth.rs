//! Authentication middleware for flipfix-web
//!
//! Maintainers send `Authorization: Bearer <token>`. A valid token attaches
//! the maintainer record to the request extensions for downstream handlers.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use flipfix_common::api::auth::authenticate_maintainer;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

/// Authentication middleware
///
/// Returns 401 Unauthorized if the bearer token is missing or unknown.
/// Applied to protected routes only.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.auth_disabled {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    let Some(token) = token else {
        warn!("Rejected {} {}: missing bearer token", request.method(), request.uri().path());
        return Err(ApiError::Unauthorized("Missing bearer token".to_string()));
    };

    match authenticate_maintainer(&state.db, &token).await? {
        Some(maintainer) => {
            debug!("Authenticated maintainer '{}'", maintainer.username);
            request.extensions_mut().insert(maintainer);
            Ok(next.run(request).await)
        }
        None => {
            warn!("Rejected {} {}: unknown token", request.method(), request.uri().path());
            Err(ApiError::Unauthorized("Invalid token".to_string()))
        }
    }
}
