//! Linkable records
//!
//! Every record kind that can hold `[[type:ref]]` tokens, or be the target of
//! one, is listed in [`EntityKind`]. Each kind owns exactly one markdown text
//! column.

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Kind of a linkable record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Machine,
    WikiPage,
    ProblemReport,
    LogEntry,
    PartRequest,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Machine,
        EntityKind::WikiPage,
        EntityKind::ProblemReport,
        EntityKind::LogEntry,
        EntityKind::PartRequest,
    ];

    /// Value stored in `link_references.source_type` / `target_type`
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Machine => "machine",
            EntityKind::WikiPage => "wiki_page",
            EntityKind::ProblemReport => "problem_report",
            EntityKind::LogEntry => "log_entry",
            EntityKind::PartRequest => "part_request",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Machine => "machines",
            EntityKind::WikiPage => "wiki_pages",
            EntityKind::ProblemReport => "problem_reports",
            EntityKind::LogEntry => "log_entries",
            EntityKind::PartRequest => "part_requests",
        }
    }

    /// Kinds whose rows belong to a machine and go with it (`ON DELETE CASCADE`)
    pub const MACHINE_CHILDREN: [EntityKind; 3] = [
        EntityKind::ProblemReport,
        EntityKind::LogEntry,
        EntityKind::PartRequest,
    ];

    /// Markdown column that may contain link tokens
    pub fn text_column(self) -> &'static str {
        match self {
            EntityKind::Machine => "notes",
            EntityKind::WikiPage => "content",
            EntityKind::ProblemReport => "description",
            EntityKind::LogEntry | EntityKind::PartRequest => "text",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown entity kind: {}", s)))
    }
}

/// Polymorphic reference to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Insert a machine with empty notes
pub async fn insert_machine(conn: &mut SqliteConnection, slug: &str, name: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO machines (slug, name) VALUES (?, ?)")
        .bind(slug)
        .bind(name)
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Change a machine's slug
///
/// Stored links keep working because storage form uses the id.
pub async fn rename_machine(conn: &mut SqliteConnection, id: i64, slug: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE machines SET slug = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(slug)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("machine#{}", id)));
    }

    Ok(())
}

/// Insert a wiki page with empty content
pub async fn insert_wiki_page(conn: &mut SqliteConnection, slug: &str, title: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO wiki_pages (slug, title) VALUES (?, ?)")
        .bind(slug)
        .bind(title)
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Insert an open problem report for a machine
pub async fn insert_problem_report(conn: &mut SqliteConnection, machine_id: i64) -> Result<i64> {
    let result = sqlx::query("INSERT INTO problem_reports (machine_id) VALUES (?)")
        .bind(machine_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Insert an empty log entry for a machine
pub async fn insert_log_entry(conn: &mut SqliteConnection, machine_id: i64) -> Result<i64> {
    let result = sqlx::query("INSERT INTO log_entries (machine_id) VALUES (?)")
        .bind(machine_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Insert an empty parts request for a machine
pub async fn insert_part_request(conn: &mut SqliteConnection, machine_id: i64) -> Result<i64> {
    let result = sqlx::query("INSERT INTO part_requests (machine_id) VALUES (?)")
        .bind(machine_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.last_insert_rowid())
}

/// Load the markdown text of a record, `None` if the row does not exist
pub async fn load_text(conn: &mut SqliteConnection, record: EntityRef) -> Result<Option<String>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?",
        record.kind.text_column(),
        record.kind.table()
    );

    let text = sqlx::query_scalar::<_, String>(&sql)
        .bind(record.id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(text)
}

/// Overwrite the markdown text of a record
///
/// Returns false if the row does not exist.
pub async fn store_text(conn: &mut SqliteConnection, record: EntityRef, text: &str) -> Result<bool> {
    let sql = format!(
        "UPDATE {} SET {} = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        record.kind.table(),
        record.kind.text_column()
    );

    let result = sqlx::query(&sql)
        .bind(text)
        .bind(record.id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a record together with the references its text produced
///
/// Deleting a machine also removes its problem reports, log entries and
/// parts requests, so their references go too. References pointing *at*
/// deleted records are kept; they render as broken links until their
/// authors fix them. Returns false if the row does not exist.
pub async fn delete_record(conn: &mut SqliteConnection, record: EntityRef) -> Result<bool> {
    if record.kind == EntityKind::Machine {
        for child in EntityKind::MACHINE_CHILDREN {
            let sql = format!(
                "DELETE FROM link_references WHERE source_type = ? \
                 AND source_id IN (SELECT id FROM {} WHERE machine_id = ?)",
                child.table()
            );
            sqlx::query(&sql)
                .bind(child.as_str())
                .bind(record.id)
                .execute(&mut *conn)
                .await?;
        }
    }

    sqlx::query("DELETE FROM link_references WHERE source_type = ? AND source_id = ?")
        .bind(record.kind.as_str())
        .bind(record.id)
        .execute(&mut *conn)
        .await?;

    let sql = format!("DELETE FROM {} WHERE id = ?", record.kind.table());
    let result = sqlx::query(&sql).bind(record.id).execute(&mut *conn).await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    #[test]
    fn test_entity_kind_round_trips_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("gizmo".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_entity_kind_serde_matches_stored_name() {
        let json = serde_json::to_string(&EntityKind::ProblemReport).unwrap();
        assert_eq!(json, "\"problem_report\"");
    }

    #[tokio::test]
    async fn test_store_and_load_text() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let machine_id = insert_machine(&mut conn, "blackout", "Blackout").await.unwrap();
        let report_id = insert_problem_report(&mut conn, machine_id).await.unwrap();
        let report = EntityRef::new(EntityKind::ProblemReport, report_id);

        assert_eq!(load_text(&mut conn, report).await.unwrap().as_deref(), Some(""));
        assert!(store_text(&mut conn, report, "Left flipper weak").await.unwrap());
        assert_eq!(
            load_text(&mut conn, report).await.unwrap().as_deref(),
            Some("Left flipper weak")
        );
    }

    #[tokio::test]
    async fn test_missing_record() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let missing = EntityRef::new(EntityKind::LogEntry, 99);

        assert_eq!(load_text(&mut conn, missing).await.unwrap(), None);
        assert!(!store_text(&mut conn, missing, "x").await.unwrap());
        assert!(!delete_record(&mut conn, missing).await.unwrap());
        assert!(matches!(
            rename_machine(&mut conn, 99, "nope").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_record_drops_outgoing_references_only() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let machine_id = insert_machine(&mut conn, "blackout", "Blackout").await.unwrap();
        let entry_id = insert_log_entry(&mut conn, machine_id).await.unwrap();

        sqlx::query(
            "INSERT INTO link_references (source_type, source_id, target_type, target_id) VALUES
             ('log_entry', ?, 'machine', ?),
             ('wiki_page', 5, 'log_entry', ?)",
        )
        .bind(entry_id)
        .bind(machine_id)
        .bind(entry_id)
        .execute(&mut *conn)
        .await
        .unwrap();

        let entry = EntityRef::new(EntityKind::LogEntry, entry_id);
        assert!(delete_record(&mut conn, entry).await.unwrap());

        let remaining: Vec<(String, i64)> =
            sqlx::query_as("SELECT source_type, target_id FROM link_references")
                .fetch_all(&mut *conn)
                .await
                .unwrap();
        assert_eq!(remaining, vec![("wiki_page".to_string(), entry_id)]);
    }

    #[tokio::test]
    async fn test_delete_machine_drops_references_of_its_records() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let blackout = insert_machine(&mut conn, "blackout", "Blackout").await.unwrap();
        let gorgar = insert_machine(&mut conn, "gorgar", "Gorgar").await.unwrap();
        let report = insert_problem_report(&mut conn, blackout).await.unwrap();
        let entry = insert_log_entry(&mut conn, blackout).await.unwrap();
        let request = insert_part_request(&mut conn, blackout).await.unwrap();
        let other = insert_log_entry(&mut conn, gorgar).await.unwrap();

        sqlx::query(
            "INSERT INTO link_references (source_type, source_id, target_type, target_id) VALUES
             ('problem_report', ?, 'machine', ?),
             ('log_entry', ?, 'machine', ?),
             ('part_request', ?, 'machine', ?),
             ('log_entry', ?, 'machine', ?)",
        )
        .bind(report)
        .bind(gorgar)
        .bind(entry)
        .bind(gorgar)
        .bind(request)
        .bind(gorgar)
        .bind(other)
        .bind(blackout)
        .execute(&mut *conn)
        .await
        .unwrap();

        let machine = EntityRef::new(EntityKind::Machine, blackout);
        assert!(delete_record(&mut conn, machine).await.unwrap());

        let report_ref = EntityRef::new(EntityKind::ProblemReport, report);
        assert_eq!(load_text(&mut conn, report_ref).await.unwrap(), None);

        // Only gorgar's own log entry, pointing at the deleted machine, survives
        let remaining: Vec<(String, i64)> =
            sqlx::query_as("SELECT source_type, source_id FROM link_references")
                .fetch_all(&mut *conn)
                .await
                .unwrap();
        assert_eq!(remaining, vec![("log_entry".to_string(), other)]);
    }
}
