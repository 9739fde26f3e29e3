//! Link type picker data

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// One entry of the authoring-time type picker
#[derive(Debug, Serialize)]
pub struct LinkTypeSummary {
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

/// GET /api/link-types
///
/// Enabled link types in registration order.
pub async fn list_link_types(State(state): State<AppState>) -> Json<Vec<LinkTypeSummary>> {
    Json(
        state
            .registry
            .enabled()
            .map(|link_type| LinkTypeSummary {
                name: link_type.name,
                label: link_type.label,
                description: link_type.description,
            })
            .collect(),
    )
}
