//! Reference index synchronization
//!
//! `link_references` is a derived index of which record's text links to
//! which record. It is rebuilt from storage-form text on every save and is
//! never edited field by field.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use super::registry::LinkTypeRegistry;
use super::tokens::scan;
use crate::db::{EntityKind, EntityRef};
use crate::Result;

/// One persisted source -> target edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceRecord {
    pub id: i64,
    pub source: EntityRef,
    pub target: EntityRef,
}

/// Writes performed by one [`sync_references`] call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub created: Vec<EntityRef>,
    pub deleted: Vec<EntityRef>,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

/// Targets named by storage-form tokens of registered types in `text`
pub fn extract_targets(registry: &LinkTypeRegistry, text: &str) -> BTreeSet<EntityRef> {
    scan(text)
        .filter_map(|token| {
            let link_type = registry.lookup(token.name)?;
            let id = link_type.stored_id(&token.reference)?;
            Some(EntityRef::new(link_type.entity, id))
        })
        .collect()
}

/// Bring the recorded references of `source` in line with `text`
///
/// `text` must already be in storage form. Only the difference is written:
/// stale edges are deleted and new edges inserted, each in a single
/// statement. Edges present on both sides are not touched. Runs on the
/// caller's connection so it joins the caller's transaction.
pub async fn sync_references(
    conn: &mut SqliteConnection,
    registry: &LinkTypeRegistry,
    source: EntityRef,
    text: &str,
) -> Result<SyncOutcome> {
    let desired = extract_targets(registry, text);

    let existing: Vec<(i64, String, i64)> = sqlx::query_as(
        "SELECT id, target_type, target_id FROM link_references
         WHERE source_type = ? AND source_id = ?",
    )
    .bind(source.kind.as_str())
    .bind(source.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut recorded: HashMap<(String, i64), i64> = HashMap::new();
    let mut stale_ids: Vec<i64> = Vec::new();
    let mut outcome = SyncOutcome::default();

    for (row_id, target_type, target_id) in existing {
        let still_linked = target_type
            .parse::<EntityKind>()
            .map(|kind| desired.contains(&EntityRef::new(kind, target_id)))
            .unwrap_or(false);

        if still_linked {
            recorded.insert((target_type, target_id), row_id);
        } else {
            if let Ok(kind) = target_type.parse::<EntityKind>() {
                outcome.deleted.push(EntityRef::new(kind, target_id));
            } else {
                warn!(
                    "Dropping reference {} with unknown target type '{}'",
                    row_id, target_type
                );
            }
            stale_ids.push(row_id);
        }
    }

    let to_create: Vec<EntityRef> = desired
        .into_iter()
        .filter(|target| !recorded.contains_key(&(target.kind.as_str().to_string(), target.id)))
        .collect();

    if !stale_ids.is_empty() {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("DELETE FROM link_references WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in &stale_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        builder.build().execute(&mut *conn).await?;
    }

    if !to_create.is_empty() {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "INSERT INTO link_references (source_type, source_id, target_type, target_id) ",
        );
        builder.push_values(&to_create, |mut row, target| {
            row.push_bind(source.kind.as_str())
                .push_bind(source.id)
                .push_bind(target.kind.as_str())
                .push_bind(target.id);
        });
        builder.build().execute(&mut *conn).await?;
    }

    outcome.created = to_create;

    if outcome.is_noop() {
        debug!("References of {} already up to date", source);
    } else {
        debug!(
            "Synced references of {}: {} created, {} deleted",
            source,
            outcome.created.len(),
            outcome.deleted.len()
        );
    }

    Ok(outcome)
}

/// References recorded for the text of `source`
pub async fn references_from(
    conn: &mut SqliteConnection,
    source: EntityRef,
) -> Result<Vec<ReferenceRecord>> {
    let rows: Vec<(i64, String, i64)> = sqlx::query_as(
        "SELECT id, target_type, target_id FROM link_references
         WHERE source_type = ? AND source_id = ?
         ORDER BY target_type, target_id",
    )
    .bind(source.kind.as_str())
    .bind(source.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, target_type, target_id)| {
            let kind = target_type.parse().ok()?;
            Some(ReferenceRecord {
                id,
                source,
                target: EntityRef::new(kind, target_id),
            })
        })
        .collect())
}

/// References pointing at `target` ("what links here")
pub async fn references_to(
    conn: &mut SqliteConnection,
    target: EntityRef,
) -> Result<Vec<ReferenceRecord>> {
    let rows: Vec<(i64, String, i64)> = sqlx::query_as(
        "SELECT id, source_type, source_id FROM link_references
         WHERE target_type = ? AND target_id = ?
         ORDER BY source_type, source_id",
    )
    .bind(target.kind.as_str())
    .bind(target.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, source_type, source_id)| {
            let kind = source_type.parse().ok()?;
            Some(ReferenceRecord {
                id,
                source: EntityRef::new(kind, source_id),
                target,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory_database, insert_log_entry, insert_machine, insert_wiki_page};
    use crate::links::builtin::test_registry;

    struct Fixture {
        pool: sqlx::SqlitePool,
        registry: LinkTypeRegistry,
        page: EntityRef,
        machines: [i64; 3],
    }

    async fn fixture() -> Fixture {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let a = insert_machine(&mut conn, "a", "A").await.unwrap();
        let b = insert_machine(&mut conn, "b", "B").await.unwrap();
        let c = insert_machine(&mut conn, "c", "C").await.unwrap();
        let page = insert_wiki_page(&mut conn, "howto", "How To").await.unwrap();
        drop(conn);

        Fixture {
            pool,
            registry: test_registry(),
            page: EntityRef::new(EntityKind::WikiPage, page),
            machines: [a, b, c],
        }
    }

    fn machine(id: i64) -> EntityRef {
        EntityRef::new(EntityKind::Machine, id)
    }

    async fn recorded_rows(conn: &mut SqliteConnection) -> Vec<(i64, String, i64)> {
        sqlx::query_as("SELECT id, target_type, target_id FROM link_references ORDER BY id")
            .fetch_all(&mut *conn)
            .await
            .unwrap()
    }

    #[test]
    fn test_extract_targets_dedupes_and_skips_non_links() {
        let registry = test_registry();
        let targets = extract_targets(
            &registry,
            "[[machine:id:1]] [[machine:id:1]] [[problem:3]] [[machine:slug]] [[nope:4]]",
        );

        let expected: BTreeSet<_> = [
            EntityRef::new(EntityKind::Machine, 1),
            EntityRef::new(EntityKind::ProblemReport, 3),
        ]
        .into_iter()
        .collect();
        assert_eq!(targets, expected);
    }

    #[tokio::test]
    async fn test_sync_creates_then_is_idempotent() {
        let f = fixture().await;
        let mut conn = f.pool.acquire().await.unwrap();
        let [a, b, _] = f.machines;
        let text = format!("[[machine:id:{}]] and [[machine:id:{}]]", a, b);

        let first = sync_references(&mut conn, &f.registry, f.page, &text).await.unwrap();
        assert_eq!(first.created, vec![machine(a), machine(b)]);
        assert!(first.deleted.is_empty());

        let rows_before = recorded_rows(&mut conn).await;
        let second = sync_references(&mut conn, &f.registry, f.page, &text).await.unwrap();
        assert!(second.is_noop());
        assert_eq!(recorded_rows(&mut conn).await, rows_before);
    }

    #[tokio::test]
    async fn test_sync_diffs_without_touching_kept_edges() {
        let f = fixture().await;
        let mut conn = f.pool.acquire().await.unwrap();
        let [a, b, c] = f.machines;

        sync_references(&mut conn, &f.registry, f.page, &format!("[[machine:id:{}]] [[machine:id:{}]]", a, b))
            .await
            .unwrap();
        let b_row_id = recorded_rows(&mut conn)
            .await
            .into_iter()
            .find(|(_, _, target)| *target == b)
            .map(|(id, _, _)| id)
            .unwrap();

        let outcome = sync_references(
            &mut conn,
            &f.registry,
            f.page,
            &format!("[[machine:id:{}]] [[machine:id:{}]]", b, c),
        )
        .await
        .unwrap();

        assert_eq!(outcome.deleted, vec![machine(a)]);
        assert_eq!(outcome.created, vec![machine(c)]);

        let rows = recorded_rows(&mut conn).await;
        let targets: Vec<i64> = rows.iter().map(|(_, _, target)| *target).collect();
        assert_eq!(targets, vec![b, c]);
        // B keeps its original row
        assert_eq!(rows[0].0, b_row_id);
    }

    #[tokio::test]
    async fn test_sync_with_empty_text_clears_references() {
        let f = fixture().await;
        let mut conn = f.pool.acquire().await.unwrap();
        let [a, _, _] = f.machines;

        sync_references(&mut conn, &f.registry, f.page, &format!("[[machine:id:{}]]", a))
            .await
            .unwrap();
        let outcome = sync_references(&mut conn, &f.registry, f.page, "no links").await.unwrap();

        assert_eq!(outcome.deleted, vec![machine(a)]);
        assert!(recorded_rows(&mut conn).await.is_empty());
    }

    #[tokio::test]
    async fn test_sources_do_not_interfere() {
        let f = fixture().await;
        let mut conn = f.pool.acquire().await.unwrap();
        let [a, _, _] = f.machines;
        let entry = insert_log_entry(&mut conn, a).await.unwrap();
        let entry = EntityRef::new(EntityKind::LogEntry, entry);
        let text = format!("[[machine:id:{}]]", a);

        sync_references(&mut conn, &f.registry, f.page, &text).await.unwrap();
        sync_references(&mut conn, &f.registry, entry, &text).await.unwrap();
        sync_references(&mut conn, &f.registry, f.page, "").await.unwrap();

        let from_entry = references_from(&mut conn, entry).await.unwrap();
        assert_eq!(from_entry.len(), 1);
        assert_eq!(from_entry[0].target, machine(a));

        let to_a = references_to(&mut conn, machine(a)).await.unwrap();
        let sources: Vec<_> = to_a.iter().map(|r| r.source).collect();
        assert_eq!(sources, vec![entry]);
    }

    #[tokio::test]
    async fn test_unknown_target_rows_are_pruned() {
        let f = fixture().await;
        let mut conn = f.pool.acquire().await.unwrap();

        sqlx::query(
            "INSERT INTO link_references (source_type, source_id, target_type, target_id)
             VALUES ('wiki_page', ?, 'retired_kind', 1)",
        )
        .bind(f.page.id)
        .execute(&mut *conn)
        .await
        .unwrap();

        let outcome = sync_references(&mut conn, &f.registry, f.page, "").await.unwrap();
        assert!(outcome.deleted.is_empty());
        assert!(recorded_rows(&mut conn).await.is_empty());
    }
}
