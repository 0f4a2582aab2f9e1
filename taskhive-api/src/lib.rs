//! # TaskHive API Server Library
//!
//! HTTP and WebSocket front end for TaskHive groups, tasks and chat.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers
//! - `routes`: API route handlers
//! - `uploads`: Task image uploads

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod uploads;
