//! flipfix-web library - HTTP surface of the Flipfix link system
//!
//! Exposes link type listing, autocomplete search, and the save / edit /
//! render paths of linkable text fields.

use axum::Router;
use flipfix_common::links::LinkTypeRegistry;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Link types, fixed after startup
    pub registry: Arc<LinkTypeRegistry>,
    /// Skip maintainer authentication (development only)
    pub auth_disabled: bool,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, registry: LinkTypeRegistry, auth_disabled: bool) -> Self {
        Self {
            db,
            registry: Arc::new(registry),
            auth_disabled,
        }
    }
}

/// Build application router
///
/// Search and the authoring-side text endpoints require a maintainer;
/// reading rendered text, backlinks and the type list does not.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::get;

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/link-targets", get(api::search_targets))
        .route(
            "/api/records/:kind/:id/text",
            get(api::get_authoring_text).put(api::save_text),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/api/link-types", get(api::list_link_types))
        .route("/api/records/:kind/:id/rendered", get(api::get_rendered))
        .route("/api/records/:kind/:id/backlinks", get(api::get_backlinks))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
