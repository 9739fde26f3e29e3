//! Linkable text fields: edit, save, render, backlinks

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use flipfix_common::api::Maintainer;
use flipfix_common::db::{load_text, EntityKind, EntityRef};
use flipfix_common::links::{
    convert_storage_to_authoring, references_to, render_all_links, save_linked_text, SaveOutcome,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Body of a text save
#[derive(Debug, Deserialize)]
pub struct TextBody {
    /// Authoring-form text
    pub text: String,
}

/// Authoring-form text for the edit form
#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub kind: EntityKind,
    pub id: i64,
    pub text: String,
}

/// Text with links rendered as HTML
#[derive(Debug, Serialize)]
pub struct RenderedResponse {
    pub kind: EntityKind,
    pub id: i64,
    pub html: String,
}

/// Parse the `:kind` path segment; unknown kinds are a JSON 400
fn record_ref(kind: &str, id: i64) -> ApiResult<EntityRef> {
    let kind: EntityKind = kind.parse()?;
    Ok(EntityRef::new(kind, id))
}

async fn stored_text(conn: &mut SqliteConnection, record: EntityRef) -> ApiResult<String> {
    load_text(conn, record)
        .await?
        .ok_or_else(|| ApiError::NotFound(record.to_string()))
}

/// GET /api/records/:kind/:id/text
pub async fn get_authoring_text(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<TextResponse>> {
    let record = record_ref(&kind, id)?;
    let mut conn = state.db.acquire().await?;

    let stored = stored_text(&mut conn, record).await?;
    let text = convert_storage_to_authoring(&mut conn, &state.registry, &stored).await?;

    Ok(Json(TextResponse {
        kind: record.kind,
        id,
        text,
    }))
}

/// PUT /api/records/:kind/:id/text
///
/// Unresolvable links reject the whole save with a 400 form error.
pub async fn save_text(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    maintainer: Option<Extension<Maintainer>>,
    Json(body): Json<TextBody>,
) -> ApiResult<Json<SaveOutcome>> {
    let record = record_ref(&kind, id)?;
    let outcome = save_linked_text(&state.db, &state.registry, record, &body.text).await?;

    if let Some(Extension(maintainer)) = maintainer {
        info!("{} edited by '{}'", record, maintainer.username);
    }

    Ok(Json(outcome))
}

/// GET /api/records/:kind/:id/rendered
pub async fn get_rendered(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<RenderedResponse>> {
    let record = record_ref(&kind, id)?;
    let mut conn = state.db.acquire().await?;

    let stored = stored_text(&mut conn, record).await?;
    let html = render_all_links(&mut conn, &state.registry, &stored).await?;

    Ok(Json(RenderedResponse {
        kind: record.kind,
        id,
        html,
    }))
}

/// GET /api/records/:kind/:id/backlinks
///
/// Records whose text links here. The record itself need not exist any
/// more; dangling references are still listed.
pub async fn get_backlinks(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<Vec<EntityRef>>> {
    let record = record_ref(&kind, id)?;
    let mut conn = state.db.acquire().await?;
    let references = references_to(&mut conn, record).await?;

    Ok(Json(references.into_iter().map(|r| r.source).collect()))
}
