//! Realtime notifications
//!
//! Connected clients hold one session each. A session joins per-group rooms,
//! and every chat message persisted for a group is pushed to the sessions in
//! that group's room.
//!
//! # Module Structure
//!
//! - **`events`** - Wire frames exchanged with clients
//! - **`notifier`** - Session and room table, fan-out
//!
//! # Delivery
//!
//! Best-effort and at-most-once. Nothing is buffered for sessions that join a
//! room after a message was sent; clients fetch history over REST. Room
//! membership is re-checked against the group's current member set at join
//! time and again on every delivery, so a user removed from a group stops
//! receiving its messages even if their socket stays open.
//!
//! The room table is process-local. Running several API instances needs an
//! external fan-out, which this module does not provide.
//!
//! # Example
//!
//! ```
//! use taskhive_shared::auth::authorization::Actor;
//! use taskhive_shared::realtime::{Notifier, ServerEvent};
//! use uuid::Uuid;
//!
//! # async fn example() {
//! let notifier = Notifier::new();
//! let (session, mut outbox) = notifier.connect(Actor::user(Uuid::new_v4())).await;
//!
//! notifier.disconnect(session).await;
//! assert!(outbox.recv().await.is_none());
//! # }
//! ```

pub mod events;
pub mod notifier;

pub use events::{ClientEvent, ServerEvent};
pub use notifier::{Notifier, RealtimeError, SessionId};
