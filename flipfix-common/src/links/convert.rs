//! Authoring <-> storage conversion
//!
//! Authoring form is what a maintainer types; storage form is what gets
//! saved. Only slug-based types differ between the two:
//!
//! | type kind | authoring | storage |
//! |-----------|-----------|---------|
//! | slug      | `[[machine:blackout]]` | `[[machine:id:42]]` |
//! | id        | `[[problem:7]]` | `[[problem:7]]` |
//!
//! Tokens whose name is not registered, or whose ref is malformed, are not
//! links and pass through both directions untouched.

use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

use super::registry::{LinkTypeRegistry, Locator};
use super::targets::{self, fetch_stored_targets};
use super::tokens::{rewrite, scan, Reference};
use crate::Result;

/// Knobs for [`convert_authoring_to_storage_with`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Accept id-based tokens whose record does not exist
    pub allow_unresolved_ids: bool,
}

/// A token that failed to resolve at save time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenReference {
    #[serde(rename = "type")]
    pub type_name: String,
    pub reference: String,
}

/// Text contained one or more links that do not resolve
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe_broken(.broken))]
pub struct LinkValidationError {
    /// Unresolvable tokens, deduplicated, in order of first appearance
    pub broken: Vec<BrokenReference>,
}

fn describe_broken(broken: &[BrokenReference]) -> String {
    broken
        .iter()
        .map(|b| format!("[[{}:{}]] does not match any {}", b.type_name, b.reference, b.type_name))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Rewrite authoring-form tokens to storage form, validating every link
///
/// Fails with [`LinkValidationError`] if any slug, or any id of an id-based
/// type, does not resolve. Idempotent: storage-form tokens are left as they
/// are.
pub async fn convert_authoring_to_storage(
    conn: &mut SqliteConnection,
    registry: &LinkTypeRegistry,
    text: &str,
) -> Result<String> {
    convert_authoring_to_storage_with(conn, registry, text, ConvertOptions::default()).await
}

/// [`convert_authoring_to_storage`] with explicit options
pub async fn convert_authoring_to_storage_with(
    conn: &mut SqliteConnection,
    registry: &LinkTypeRegistry,
    text: &str,
    options: ConvertOptions,
) -> Result<String> {
    let mut slugs: HashMap<&'static str, Vec<&str>> = HashMap::new();
    let mut ids: HashMap<&'static str, Vec<i64>> = HashMap::new();

    for token in scan(text) {
        let Some(link_type) = registry.lookup(token.name) else {
            continue;
        };
        match (link_type.locator, token.reference) {
            (Locator::Slug { .. }, Reference::Plain(slug)) => {
                let list = slugs.entry(link_type.name).or_default();
                if !list.contains(&slug) {
                    list.push(slug);
                }
            }
            (Locator::Id, reference) if !options.allow_unresolved_ids => {
                if let Some(id) = reference.plain_id() {
                    let list = ids.entry(link_type.name).or_default();
                    if !list.contains(&id) {
                        list.push(id);
                    }
                }
            }
            _ => {}
        }
    }

    let mut resolved: HashMap<&'static str, HashMap<String, i64>> = HashMap::new();
    for (name, wanted) in &slugs {
        if let Some(link_type) = registry.lookup(name) {
            resolved.insert(*name, targets::resolve_slugs(conn, link_type, wanted).await?);
        }
    }

    let mut existing: HashMap<&'static str, HashSet<i64>> = HashMap::new();
    for (name, wanted) in &ids {
        if let Some(link_type) = registry.lookup(name) {
            let found = targets::fetch_by_ids(conn, link_type, wanted).await?;
            existing.insert(*name, found.into_keys().collect());
        }
    }

    let mut broken: Vec<BrokenReference> = Vec::new();
    let mut converted = 0usize;

    let output = rewrite(text, |token| {
        let link_type = registry.lookup(token.name)?;
        let missing = match (link_type.locator, token.reference) {
            (Locator::Slug { .. }, Reference::Plain(slug)) => {
                match resolved.get(link_type.name).and_then(|map| map.get(slug)) {
                    Some(&id) => {
                        converted += 1;
                        return Some(link_type.storage_token(id));
                    }
                    None => true,
                }
            }
            (Locator::Id, reference) if !options.allow_unresolved_ids => match reference.plain_id() {
                Some(id) => !existing
                    .get(link_type.name)
                    .is_some_and(|found| found.contains(&id)),
                None => false,
            },
            _ => false,
        };

        if missing {
            let entry = BrokenReference {
                type_name: link_type.name.to_string(),
                reference: token.raw_ref.to_string(),
            };
            if !broken.contains(&entry) {
                broken.push(entry);
            }
        }
        None
    });

    if !broken.is_empty() {
        debug!("Rejected text with {} unresolvable link(s)", broken.len());
        return Err(LinkValidationError { broken }.into());
    }

    debug!("Converted {} link token(s) to storage form", converted);
    Ok(output)
}

/// Rewrite storage-form tokens of slug-based types back to authoring form
///
/// Uses each record's current slug. Tokens whose record no longer exists
/// stay in storage form so the author can see what broke.
pub async fn convert_storage_to_authoring(
    conn: &mut SqliteConnection,
    registry: &LinkTypeRegistry,
    text: &str,
) -> Result<String> {
    let found = fetch_stored_targets(conn, registry, text, |t| t.is_slug_based()).await?;

    Ok(rewrite(text, |token| {
        let link_type = registry.lookup(token.name)?;
        if !link_type.is_slug_based() {
            return None;
        }
        let id = link_type.stored_id(&token.reference)?;
        let target = found.get(link_type.name)?.get(&id)?;
        let slug = target.slug.as_deref()?;
        Some(format!("[[{}:{}]]", link_type.name, slug))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        delete_record, init_memory_database, insert_machine, insert_problem_report, rename_machine,
        EntityKind, EntityRef,
    };
    use crate::links::builtin::test_registry;
    use crate::Error;
    use sqlx::SqlitePool;

    /// blackout = machine 1, problem 1 on it
    async fn seeded() -> (SqlitePool, LinkTypeRegistry, i64, i64) {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let machine = insert_machine(&mut conn, "blackout", "Blackout").await.unwrap();
        let problem = insert_problem_report(&mut conn, machine).await.unwrap();
        drop(conn);
        (pool, test_registry(), machine, problem)
    }

    #[tokio::test]
    async fn test_mixed_multi_type_text() {
        let (pool, registry, machine, problem) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();

        let text = format!("See [[machine:blackout]] and [[problem:{}]] for details.", problem);
        let stored = convert_authoring_to_storage(&mut conn, &registry, &text).await.unwrap();

        assert_eq!(
            stored,
            format!("See [[machine:id:{}]] and [[problem:{}]] for details.", machine, problem)
        );
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (pool, registry, _, problem) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();

        let text = format!(
            "[[machine:blackout]] twice: [[machine:blackout]], then [[problem:{}]]",
            problem
        );
        let stored = convert_authoring_to_storage(&mut conn, &registry, &text).await.unwrap();
        let authored = convert_storage_to_authoring(&mut conn, &registry, &stored).await.unwrap();

        assert_eq!(authored, text);
    }

    #[tokio::test]
    async fn test_conversion_is_idempotent() {
        let (pool, registry, _, problem) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();

        let text = format!("[[machine:blackout]] / [[problem:{}]]", problem);
        let once = convert_authoring_to_storage(&mut conn, &registry, &text).await.unwrap();
        let twice = convert_authoring_to_storage(&mut conn, &registry, &once).await.unwrap();

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_unknown_types_are_left_alone() {
        let (pool, registry, _, _) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();

        let text = "[[unknown:foo]] and [[machine:id:abc]] and [[problem:seven]]";
        assert_eq!(
            convert_authoring_to_storage(&mut conn, &registry, text).await.unwrap(),
            text
        );
        assert_eq!(
            convert_storage_to_authoring(&mut conn, &registry, text).await.unwrap(),
            text
        );
    }

    #[tokio::test]
    async fn test_unresolvable_slug_fails_with_named_reference() {
        let (pool, registry, _, _) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();

        let result =
            convert_authoring_to_storage(&mut conn, &registry, "[[machine:nonexistent-slug]]").await;

        match result {
            Err(Error::LinkValidation(err)) => {
                assert_eq!(
                    err.broken,
                    vec![BrokenReference {
                        type_name: "machine".to_string(),
                        reference: "nonexistent-slug".to_string(),
                    }]
                );
                let message = err.to_string();
                assert!(message.contains("machine"));
                assert!(message.contains("nonexistent-slug"));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_every_broken_reference_is_reported_once() {
        let (pool, registry, _, _) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();

        let text = "[[machine:nope]] [[problem:404]] [[machine:nope]] [[machine:blackout]]";
        let err = match convert_authoring_to_storage(&mut conn, &registry, text).await {
            Err(Error::LinkValidation(err)) => err,
            other => panic!("Expected validation error, got {:?}", other),
        };

        let refs: Vec<_> = err
            .broken
            .iter()
            .map(|b| format!("{}:{}", b.type_name, b.reference))
            .collect();
        assert_eq!(refs, vec!["machine:nope", "problem:404"]);
    }

    #[tokio::test]
    async fn test_unresolved_ids_can_be_tolerated() {
        let (pool, registry, _, _) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();

        let options = ConvertOptions { allow_unresolved_ids: true };
        let stored =
            convert_authoring_to_storage_with(&mut conn, &registry, "[[problem:404]]", options)
                .await
                .unwrap();
        assert_eq!(stored, "[[problem:404]]");

        // Slugs are still validated
        let result = convert_authoring_to_storage_with(&mut conn, &registry, "[[machine:nope]]", options)
            .await;
        assert!(matches!(result, Err(Error::LinkValidation(_))));
    }

    #[tokio::test]
    async fn test_storage_to_authoring_uses_current_slug() {
        let (pool, registry, machine, _) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();

        rename_machine(&mut conn, machine, "blackout-2").await.unwrap();

        let stored = format!("[[machine:id:{}]]", machine);
        let authored = convert_storage_to_authoring(&mut conn, &registry, &stored).await.unwrap();
        assert_eq!(authored, "[[machine:blackout-2]]");
    }

    #[tokio::test]
    async fn test_storage_to_authoring_keeps_dangling_tokens() {
        let (pool, registry, machine, problem) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();

        delete_record(&mut conn, EntityRef::new(EntityKind::Machine, machine))
            .await
            .unwrap();

        let stored = format!("[[machine:id:{}]] [[problem:{}]]", machine, problem);
        let authored = convert_storage_to_authoring(&mut conn, &registry, &stored).await.unwrap();
        assert_eq!(authored, stored);
    }
}
