//! Cross-record markdown links
//!
//! Free text anywhere in Flipfix may embed `[[type:ref]]` tokens. Humans type
//! the authoring form (`[[machine:blackout]]`); the database stores the
//! storage form (`[[machine:id:42]]`), which survives slug renames. Types with
//! numeric refs (`[[problem:7]]`) look the same in both forms.
//!
//! Save path: [`convert_authoring_to_storage`] then [`sync_references`], both
//! inside the caller's transaction ([`save_linked_text`] does exactly that).
//! Display path: [`render_all_links`]. Edit path: [`convert_storage_to_authoring`].

pub mod builtin;
pub mod convert;
pub mod references;
pub mod registry;
pub mod render;
pub mod service;
pub mod targets;
pub mod tokens;

pub use builtin::{default_registry, register_builtin_types};
pub use convert::{
    convert_authoring_to_storage, convert_authoring_to_storage_with, convert_storage_to_authoring,
    BrokenReference, ConvertOptions, LinkValidationError,
};
pub use references::{
    extract_targets, references_from, references_to, sync_references, ReferenceRecord,
    SyncOutcome,
};
pub use registry::{LinkType, LinkTypeRegistry, Locator, TargetQuery};
pub use render::{render_all_links, BROKEN_LINK_HTML};
pub use service::{save_linked_text, search_link_targets, SaveOutcome, SearchHit};
pub use targets::LinkTarget;
