//! # Flipfix Common Library
//!
//! Shared code for the Flipfix maintenance tracker including:
//! - Database schema and record access
//! - `[[type:ref]]` cross-record links (registry, conversion, rendering, reference index)
//! - Maintainer token authentication primitives
//! - Configuration loading

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod links;

pub use error::{Error, Result};
