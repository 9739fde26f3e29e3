//! Link types shipped with Flipfix

use super::registry::{LinkType, LinkTypeRegistry, Locator, TargetQuery};
use super::targets::LinkTarget;
use crate::config::FeatureFlags;
use crate::db::EntityKind;
use crate::Result;

/// Longest record text shown in an autocomplete label
const SEARCH_LABEL_CHARS: usize = 60;

fn machine() -> LinkType {
    LinkType {
        name: "machine",
        label: "Machine",
        description: "Link to a machine",
        entity: EntityKind::Machine,
        locator: Locator::Slug { column: "m.slug" },
        query: TargetQuery {
            select: "SELECT m.id AS id, m.slug AS slug, m.name AS title, \
                     NULL AS parent_slug, NULL AS parent_title FROM machines m",
            id_column: "m.id",
            search_columns: &["m.name", "m.slug"],
            order_by: "m.name",
        },
        url: |target| format!("/machines/{}/", slug_or_id(target)),
        display: |target| target.title.clone(),
        search_label: |target| target.title.clone(),
        enabled: None,
    }
}

fn wiki_page() -> LinkType {
    LinkType {
        name: "page",
        label: "Wiki page",
        description: "Link to a wiki page",
        entity: EntityKind::WikiPage,
        locator: Locator::Slug { column: "w.slug" },
        query: TargetQuery {
            select: "SELECT w.id AS id, w.slug AS slug, w.title AS title, \
                     NULL AS parent_slug, NULL AS parent_title FROM wiki_pages w",
            id_column: "w.id",
            search_columns: &["w.title", "w.slug"],
            order_by: "w.title",
        },
        url: |target| format!("/wiki/{}/", slug_or_id(target)),
        display: |target| target.title.clone(),
        search_label: |target| format!("{} ({})", target.title, slug_or_id(target)),
        enabled: None,
    }
}

fn problem_report() -> LinkType {
    LinkType {
        name: "problem",
        label: "Problem report",
        description: "Link to a problem report",
        entity: EntityKind::ProblemReport,
        locator: Locator::Id,
        query: TargetQuery {
            select: "SELECT p.id AS id, NULL AS slug, p.description AS title, \
                     m.slug AS parent_slug, m.name AS parent_title \
                     FROM problem_reports p JOIN machines m ON m.id = p.machine_id",
            id_column: "p.id",
            search_columns: &["p.description", "m.name"],
            order_by: "p.id DESC",
        },
        url: |target| format!("/problem-reports/{}/", target.id),
        display: |target| format!("Problem #{}", target.id),
        search_label: numbered_search_label,
        enabled: None,
    }
}

fn log_entry() -> LinkType {
    LinkType {
        name: "log",
        label: "Log entry",
        description: "Link to a maintenance log entry",
        entity: EntityKind::LogEntry,
        locator: Locator::Id,
        query: TargetQuery {
            select: "SELECT l.id AS id, NULL AS slug, l.text AS title, \
                     m.slug AS parent_slug, m.name AS parent_title \
                     FROM log_entries l JOIN machines m ON m.id = l.machine_id",
            id_column: "l.id",
            search_columns: &["l.text", "m.name"],
            order_by: "l.id DESC",
        },
        url: |target| format!("/logs/{}/", target.id),
        display: |target| format!("Log #{}", target.id),
        search_label: numbered_search_label,
        enabled: None,
    }
}

fn part_request() -> LinkType {
    LinkType {
        name: "partrequest",
        label: "Parts request",
        description: "Link to a parts request",
        entity: EntityKind::PartRequest,
        locator: Locator::Id,
        query: TargetQuery {
            select: "SELECT r.id AS id, NULL AS slug, r.text AS title, \
                     m.slug AS parent_slug, m.name AS parent_title \
                     FROM part_requests r JOIN machines m ON m.id = r.machine_id",
            id_column: "r.id",
            search_columns: &["r.text", "m.name"],
            order_by: "r.id DESC",
        },
        url: |target| format!("/parts/{}/", target.id),
        display: |target| format!("Parts Request #{}", target.id),
        search_label: numbered_search_label,
        enabled: None,
    }
}

fn slug_or_id(target: &LinkTarget) -> String {
    target.slug.clone().unwrap_or_else(|| target.id.to_string())
}

/// `#7 Blackout: left flipper weak`
fn numbered_search_label(target: &LinkTarget) -> String {
    let summary: String = target
        .title
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(SEARCH_LABEL_CHARS)
        .collect();

    match (&target.parent_title, summary.is_empty()) {
        (Some(parent), false) => format!("#{} {}: {}", target.id, parent, summary),
        (Some(parent), true) => format!("#{} {}", target.id, parent),
        (None, _) => format!("#{} {}", target.id, summary).trim_end().to_string(),
    }
}

/// Register every built-in link type
///
/// Wiki and parts links follow their feature flags; they stay registered
/// when disabled so existing text keeps converting and rendering.
pub fn register_builtin_types(registry: &mut LinkTypeRegistry, features: &FeatureFlags) -> Result<()> {
    let wiki_enabled = features.wiki_enabled;
    let parts_enabled = features.parts_enabled;

    registry.register(machine())?;
    registry.register(wiki_page().with_enabled(move || wiki_enabled))?;
    registry.register(problem_report())?;
    registry.register(log_entry())?;
    registry.register(part_request().with_enabled(move || parts_enabled))?;

    Ok(())
}

/// Registry holding the built-in link types
pub fn default_registry(features: &FeatureFlags) -> Result<LinkTypeRegistry> {
    let mut registry = LinkTypeRegistry::new();
    register_builtin_types(&mut registry, features)?;
    Ok(registry)
}

#[cfg(test)]
pub(crate) fn test_registry() -> LinkTypeRegistry {
    default_registry(&FeatureFlags::default()).expect("built-in types register cleanly")
}
