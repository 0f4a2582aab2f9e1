//! # TaskHive Shared Library
//!
//! This crate contains the domain types, stores, and business logic used by
//! the TaskHive API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `store`: Store traits with PostgreSQL and in-memory implementations
//! - `auth`: Authentication (JWT, passwords) and the authorization engine
//! - `groups`: Group lifecycle (create, join, leave, member overwrite, delete)
//! - `tasks`: Membership-gated task operations
//! - `chat`: Chat send/history with realtime fan-out
//! - `realtime`: Room table and broadcast for connected sessions
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod chat;
pub mod db;
pub mod groups;
pub mod models;
pub mod realtime;
pub mod store;
pub mod tasks;

/// Current version of the TaskHive shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
