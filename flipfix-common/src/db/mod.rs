//! Database schema and record access

pub mod init;
pub mod records;

pub use init::*;
pub use records::*;
