/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `users`: Registration, login and profile
/// - `groups`: Group lifecycle and membership
/// - `tasks`: Task CRUD with image uploads
/// - `chat`: Group chat history and sending
/// - `realtime`: WebSocket channel for chat rooms

pub mod chat;
pub mod groups;
pub mod health;
pub mod realtime;
pub mod tasks;
pub mod users;
