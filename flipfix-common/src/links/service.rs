//! Save and search entry points used by the web layer

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::convert::convert_authoring_to_storage;
use super::references::{sync_references, SyncOutcome};
use super::registry::{LinkType, LinkTypeRegistry};
use super::targets;
use crate::db::{store_text, EntityRef};
use crate::{Error, Result};

/// Result of saving a text field
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    /// Text as persisted (storage form)
    pub text: String,
    pub references: SyncOutcome,
}

/// One autocomplete result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub label: String,
    /// What to type after `[[type:`
    #[serde(rename = "ref")]
    pub reference: String,
}

/// Validate, convert and store the text of `source`, then resync its references
///
/// Everything happens in one transaction: a broken link or a missing source
/// row leaves both the text and the reference index untouched.
pub async fn save_linked_text(
    pool: &SqlitePool,
    registry: &LinkTypeRegistry,
    source: EntityRef,
    authoring_text: &str,
) -> Result<SaveOutcome> {
    let mut tx = pool.begin().await?;

    let text = convert_authoring_to_storage(&mut tx, registry, authoring_text).await?;

    if !store_text(&mut tx, source, &text).await? {
        return Err(Error::NotFound(source.to_string()));
    }

    let references = sync_references(&mut tx, registry, source, &text).await?;

    tx.commit().await?;

    info!(
        "Saved text of {} ({} link(s) added, {} removed)",
        source,
        references.created.len(),
        references.deleted.len()
    );

    Ok(SaveOutcome { text, references })
}

/// Autocomplete search for one link type
pub async fn search_link_targets(
    conn: &mut SqliteConnection,
    link_type: &LinkType,
    query: &str,
    limit: i64,
) -> Result<Vec<SearchHit>> {
    let found = targets::search(conn, link_type, query, limit).await?;

    Ok(found
        .iter()
        .map(|target| SearchHit {
            label: (link_type.search_label)(target),
            reference: link_type.authoring_ref(target),
        })
        .collect())
}
