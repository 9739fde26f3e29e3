//! HTTP API handlers for flipfix-web

pub mod auth;
pub mod health;
pub mod link_types;
pub mod records;
pub mod search;

pub use auth::auth_middleware;
pub use health::health_routes;
pub use link_types::list_link_types;
pub use records::{get_authoring_text, get_backlinks, get_rendered, save_text};
pub use search::search_targets;
