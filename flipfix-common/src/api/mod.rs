//! API module for shared HTTP API functionality
//!
//! Contains ONLY pure functions, database operations and shared types. The
//! web crate wraps these in framework-specific middleware.

pub mod auth;

pub use auth::{authenticate_maintainer, create_maintainer, generate_token, hash_token, Maintainer};
