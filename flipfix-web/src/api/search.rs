//! Link target autocomplete

use axum::{
    extract::{Query, State},
    Json,
};
use flipfix_common::links::{self, SearchHit};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Maximum hits returned per query
pub const SEARCH_LIMIT: i64 = 20;

/// Query parameters for link target search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Link type name, e.g. `machine`
    #[serde(rename = "type")]
    pub link_type: String,

    /// Free-text query; empty lists the first targets
    #[serde(default)]
    pub q: String,
}

/// GET /api/link-targets?type=machine&q=black
///
/// Returns `[{label, ref}]`. Unknown and disabled types are 404.
pub async fn search_targets(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<SearchHit>>> {
    let link_type = state
        .registry
        .lookup(&query.link_type)
        .filter(|link_type| link_type.is_enabled())
        .ok_or_else(|| ApiError::NotFound(format!("Unknown link type: {}", query.link_type)))?;

    let mut conn = state.db.acquire().await?;
    let hits = links::search_link_targets(&mut conn, link_type, &query.q, SEARCH_LIMIT).await?;

    Ok(Json(hits))
}
