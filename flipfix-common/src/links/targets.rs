//! Batched lookups of link targets
//!
//! All helpers issue one query per link type regardless of how many tokens
//! reference it.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

use super::registry::{LinkType, LinkTypeRegistry, Locator};
use super::tokens::scan;
use crate::Result;

/// Targets found per link type name, keyed by record id
pub type TargetsByType = HashMap<&'static str, HashMap<i64, LinkTarget>>;

/// A resolved link target, as produced by a type's [`super::TargetQuery`]
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LinkTarget {
    pub id: i64,
    pub slug: Option<String>,
    pub title: String,
    /// Slug of the owning record (e.g. the machine of a problem report)
    pub parent_slug: Option<String>,
    pub parent_title: Option<String>,
}

/// Fetch targets by id, keyed by id; missing ids are simply absent
pub async fn fetch_by_ids(
    conn: &mut SqliteConnection,
    link_type: &LinkType,
    ids: &[i64],
) -> Result<HashMap<i64, LinkTarget>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(link_type.query.select);
    builder.push(" WHERE ").push(link_type.query.id_column).push(" IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let rows: Vec<LinkTarget> = builder.build_query_as().fetch_all(&mut *conn).await?;

    Ok(rows.into_iter().map(|target| (target.id, target)).collect())
}

/// Fetch every target referenced by storage-form tokens in `text`
///
/// Only tokens of registered types accepted by `include` are considered.
/// One query per type.
pub async fn fetch_stored_targets<F>(
    conn: &mut SqliteConnection,
    registry: &LinkTypeRegistry,
    text: &str,
    include: F,
) -> Result<TargetsByType>
where
    F: Fn(&LinkType) -> bool,
{
    let mut wanted: HashMap<&'static str, Vec<i64>> = HashMap::new();
    for token in scan(text) {
        let Some(link_type) = registry.lookup(token.name) else {
            continue;
        };
        if !include(link_type) {
            continue;
        }
        if let Some(id) = link_type.stored_id(&token.reference) {
            let ids = wanted.entry(link_type.name).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    let mut found = TargetsByType::new();
    for (name, ids) in wanted {
        if let Some(link_type) = registry.lookup(name) {
            found.insert(name, fetch_by_ids(conn, link_type, &ids).await?);
        }
    }

    Ok(found)
}

/// Resolve slugs to ids for a slug-based type; unknown slugs are absent
///
/// Id-based types have no slugs and always yield an empty map.
pub async fn resolve_slugs(
    conn: &mut SqliteConnection,
    link_type: &LinkType,
    slugs: &[&str],
) -> Result<HashMap<String, i64>> {
    let column = match link_type.locator {
        Locator::Slug { column } => column,
        Locator::Id => return Ok(HashMap::new()),
    };
    if slugs.is_empty() {
        return Ok(HashMap::new());
    }

    let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(link_type.query.select);
    builder.push(" WHERE ").push(column).push(" IN (");
    let mut separated = builder.separated(", ");
    for slug in slugs {
        separated.push_bind(slug.to_string());
    }
    separated.push_unseparated(")");

    let rows: Vec<LinkTarget> = builder.build_query_as().fetch_all(&mut *conn).await?;

    Ok(rows
        .into_iter()
        .filter_map(|target| target.slug.map(|slug| (slug, target.id)))
        .collect())
}

/// Substring search over the type's search columns
///
/// Matching is case-insensitive (SQLite `LIKE` on ASCII). `%` and `_` in the
/// query are literal. An empty query lists the first `limit` targets.
pub async fn search(
    conn: &mut SqliteConnection,
    link_type: &LinkType,
    query: &str,
    limit: i64,
) -> Result<Vec<LinkTarget>> {
    let query = query.trim();
    let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(link_type.query.select);

    if !query.is_empty() && !link_type.query.search_columns.is_empty() {
        let pattern = format!("%{}%", escape_like(query));
        builder.push(" WHERE (");
        let mut separated = builder.separated(" OR ");
        for column in link_type.query.search_columns {
            separated
                .push(*column)
                .push_unseparated(" LIKE ")
                .push_bind_unseparated(pattern.clone())
                .push_unseparated(" ESCAPE '\\'");
        }
        separated.push_unseparated(")");
    }

    builder
        .push(" ORDER BY ")
        .push(link_type.query.order_by)
        .push(" LIMIT ")
        .push_bind(limit);

    let rows: Vec<LinkTarget> = builder.build_query_as().fetch_all(&mut *conn).await?;
    Ok(rows)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
