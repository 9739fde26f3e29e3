//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    /// Link types known to the registry, enabled or not
    pub link_types: usize,
    /// Link types currently offered for authoring
    pub enabled_link_types: usize,
    pub auth_disabled: bool,
}

/// GET /health
///
/// Public. Also a quick way to see which feature flags took effect.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        module: "flipfix-web",
        version: env!("CARGO_PKG_VERSION"),
        link_types: state.registry.len(),
        enabled_link_types: state.registry.enabled().count(),
        auth_disabled: state.auth_disabled,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
