//! # Portal Shared Library
//!
//! This crate contains the shared types and business logic behind the
//! business portal API server.
//!
//! ## Module Organization
//!
//! - `auth`: Password hashing, JWT tokens, request authentication and
//!   department-scoped authorization
//! - `db`: Connection pooling and migrations
//! - `models`: Database models and their CRUD operations
//! - `realtime`: WebSocket room hub and wire protocol for live notifications

pub mod auth;
pub mod db;
pub mod models;
pub mod realtime;

/// Current version of the portal shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
