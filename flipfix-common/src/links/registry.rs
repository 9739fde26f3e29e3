//! Link type registry
//!
//! Each feature area describes its linkable records as a [`LinkType`] and
//! registers it once during startup. After startup the registry is shared
//! read-only (behind an `Arc` in application state), so lookups need no
//! locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::targets::LinkTarget;
use super::tokens::Reference;
use crate::db::EntityKind;
use crate::{Error, Result};

/// Runtime switch for hiding a link type without unregistering it
pub type EnabledFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// How the `ref` part of an authoring-form token identifies a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// `[[machine:blackout]]`, resolved through the given slug column and
    /// stored as `[[machine:id:42]]`
    Slug { column: &'static str },
    /// `[[problem:7]]`, identical in authoring and storage form
    Id,
}

/// SQL describing where targets of one link type live
///
/// `select` must produce the columns `id`, `slug`, `title`, `parent_slug` and
/// `parent_title` (NULL where meaningless) and must not contain a WHERE
/// clause; the batched helpers in [`super::targets`] append their own.
#[derive(Debug, Clone, Copy)]
pub struct TargetQuery {
    pub select: &'static str,
    /// Qualified id column used in `IN (...)` lookups
    pub id_column: &'static str,
    /// Columns matched by substring search
    pub search_columns: &'static [&'static str],
    pub order_by: &'static str,
}

/// One kind of linkable record
pub struct LinkType {
    /// Name used inside tokens: `[[name:...]]`
    pub name: &'static str,
    /// Human label for the type picker
    pub label: &'static str,
    pub description: &'static str,
    pub entity: EntityKind,
    pub locator: Locator,
    pub query: TargetQuery,
    /// Target URL of a resolved record
    pub url: fn(&LinkTarget) -> String,
    /// Anchor text of a resolved record
    pub display: fn(&LinkTarget) -> String,
    /// Label shown in autocomplete results
    pub search_label: fn(&LinkTarget) -> String,
    /// `None` means always enabled
    pub enabled: Option<EnabledFn>,
}

impl LinkType {
    /// Attach a runtime enable predicate
    pub fn with_enabled<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.enabled = Some(Arc::new(predicate));
        self
    }

    pub fn is_slug_based(&self) -> bool {
        matches!(self.locator, Locator::Slug { .. })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.as_ref().map_or(true, |predicate| predicate())
    }

    /// The `ref` a human would type for this target
    pub fn authoring_ref(&self, target: &LinkTarget) -> String {
        match (&self.locator, &target.slug) {
            (Locator::Slug { .. }, Some(slug)) => slug.clone(),
            _ => target.id.to_string(),
        }
    }

    /// Record id named by a storage-form reference of this type
    ///
    /// `None` for authoring-form slugs and anything malformed.
    pub fn stored_id(&self, reference: &Reference<'_>) -> Option<i64> {
        match (self.locator, reference) {
            (Locator::Slug { .. }, Reference::Stored(id)) => Some(*id),
            (Locator::Id, reference) => reference.plain_id(),
            _ => None,
        }
    }

    /// Storage-form token for a record id
    pub fn storage_token(&self, id: i64) -> String {
        match self.locator {
            Locator::Slug { .. } => format!("[[{}:id:{}]]", self.name, id),
            Locator::Id => format!("[[{}:{}]]", self.name, id),
        }
    }
}

impl fmt::Debug for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkType")
            .field("name", &self.name)
            .field("entity", &self.entity)
            .field("locator", &self.locator)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Table of link types keyed by name, in registration order
#[derive(Debug, Default)]
pub struct LinkTypeRegistry {
    types: Vec<LinkType>,
    by_name: HashMap<&'static str, usize>,
}

impl LinkTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a link type
    ///
    /// A second registration under the same name is a programming error and
    /// is rejected rather than overwriting the first.
    pub fn register(&mut self, link_type: LinkType) -> Result<()> {
        if self.by_name.contains_key(link_type.name) {
            return Err(Error::DuplicateLinkType(link_type.name.to_string()));
        }

        info!(
            "Registered link type '{}' ({}, {})",
            link_type.name,
            link_type.entity,
            if link_type.is_slug_based() { "slug" } else { "id" }
        );

        self.by_name.insert(link_type.name, self.types.len());
        self.types.push(link_type);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&LinkType> {
        self.by_name.get(name).map(|&index| &self.types[index])
    }

    /// All registered types in registration order
    pub fn all(&self) -> impl Iterator<Item = &LinkType> {
        self.types.iter()
    }

    /// Registered types whose enable predicate currently holds
    pub fn enabled(&self) -> impl Iterator<Item = &LinkType> {
        self.types.iter().filter(|link_type| link_type.is_enabled())
    }

    /// Link type whose targets are records of `kind`
    pub fn for_entity(&self, kind: EntityKind) -> Option<&LinkType> {
        self.types.iter().find(|link_type| link_type.entity == kind)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
