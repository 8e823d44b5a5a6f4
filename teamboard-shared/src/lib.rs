//! # Teamboard Shared Library
//!
//! Domain types, persistence and business rules for the Teamboard API.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `auth`: Tokens, passwords, request identity and the authorization gate
//! - `services`: Membership-aware workflows (invitations, teams, projects, tasks)
//! - `storage`: Comment attachment blob storage
//! - `pagination`: Page requests and paged results
//! - `db`: Connection pool and migrations
//! - `error`: Domain error taxonomy

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;
pub mod storage;

/// Current version of the Teamboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
