/// Session and room table
///
/// Each connected client gets a [`SessionId`] and an unbounded outbox. The
/// transport drains the outbox into its socket; everything the server wants
/// to tell that client (acks, errors, new messages) goes through it, so
/// frames arrive in the order they were produced.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::ServerEvent;
use crate::auth::authorization::{can_perform, Actor, GroupAction};
use crate::models::chat_message::PopulatedMessage;
use crate::models::group::Group;

/// Identifies one connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RealtimeError {
    #[error("Unknown session")]
    UnknownSession,

    #[error("Group not found")]
    GroupNotFound,

    #[error("Internal server error")]
    Internal,

    #[error("{0}")]
    Forbidden(String),
}

struct Session {
    actor: Actor,
    outbox: mpsc::UnboundedSender<ServerEvent>,
    rooms: HashSet<Uuid>,
}

#[derive(Default)]
struct Table {
    sessions: HashMap<SessionId, Session>,
    rooms: HashMap<Uuid, HashSet<SessionId>>,
}

impl Table {
    fn leave(&mut self, session_id: SessionId, group_id: Uuid) -> bool {
        let removed = self
            .rooms
            .get_mut(&group_id)
            .map(|members| members.remove(&session_id))
            .unwrap_or(false);
        if self.rooms.get(&group_id).is_some_and(|m| m.is_empty()) {
            self.rooms.remove(&group_id);
        }
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.rooms.remove(&group_id);
        }
        removed
    }

    fn drop_session(&mut self, session_id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&session_id)?;
        for group_id in &session.rooms {
            if let Some(members) = self.rooms.get_mut(group_id) {
                members.remove(&session_id);
                if members.is_empty() {
                    self.rooms.remove(group_id);
                }
            }
        }
        Some(session)
    }
}

/// Process-local realtime hub
#[derive(Default)]
pub struct Notifier {
    table: RwLock<Table>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session for `actor` and returns its outbox
    pub async fn connect(
        &self,
        actor: Actor,
    ) -> (SessionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        let session_id = SessionId(Uuid::new_v4());

        self.table.write().await.sessions.insert(
            session_id,
            Session {
                actor,
                outbox,
                rooms: HashSet::new(),
            },
        );

        debug!(session_id = %session_id, user_id = %actor.user_id, "[Realtime] Session connected");
        (session_id, rx)
    }

    /// Forgets the session and all of its rooms; its outbox closes
    pub async fn disconnect(&self, session_id: SessionId) {
        if let Some(session) = self.table.write().await.drop_session(session_id) {
            debug!(
                session_id = %session_id,
                user_id = %session.actor.user_id,
                rooms = session.rooms.len(),
                "[Realtime] Session disconnected"
            );
        }
    }

    /// Puts the session in `group`'s room if its actor may view the group
    ///
    /// Acknowledged with `room_joined`; a refusal is reported to the client
    /// as an `error` frame and returned as `Forbidden`.
    pub async fn join_room(&self, session_id: SessionId, group: &Group) -> Result<(), RealtimeError> {
        let mut table = self.table.write().await;
        let session = table
            .sessions
            .get_mut(&session_id)
            .ok_or(RealtimeError::UnknownSession)?;

        if let Err(denied) = can_perform(&session.actor, group, GroupAction::View) {
            warn!(
                session_id = %session_id,
                user_id = %session.actor.user_id,
                group_id = %group.id,
                "[Realtime] Room join denied"
            );
            let _ = session.outbox.send(ServerEvent::error(denied.to_string()));
            return Err(RealtimeError::Forbidden(denied.to_string()));
        }

        session.rooms.insert(group.id);
        let _ = session.outbox.send(ServerEvent::RoomJoined { group_id: group.id });
        table.rooms.entry(group.id).or_default().insert(session_id);

        debug!(session_id = %session_id, group_id = %group.id, "[Realtime] Joined room");
        Ok(())
    }

    /// Takes the session out of a room; acknowledged with `room_left`
    pub async fn leave_room(&self, session_id: SessionId, group_id: Uuid) -> Result<(), RealtimeError> {
        let mut table = self.table.write().await;
        if !table.sessions.contains_key(&session_id) {
            return Err(RealtimeError::UnknownSession);
        }

        table.leave(session_id, group_id);
        if let Some(session) = table.sessions.get(&session_id) {
            let _ = session.outbox.send(ServerEvent::RoomLeft { group_id });
        }

        debug!(session_id = %session_id, group_id = %group_id, "[Realtime] Left room");
        Ok(())
    }

    /// Pushes an `error` frame to one session
    pub async fn send_error(&self, session_id: SessionId, message: impl Into<String>) {
        if let Some(session) = self.table.read().await.sessions.get(&session_id) {
            let _ = session.outbox.send(ServerEvent::error(message));
        }
    }

    /// Delivers `message` to every session in `group`'s room
    ///
    /// `group` must be the freshly loaded record: sessions whose actor can no
    /// longer view it are removed from the room instead of receiving the
    /// message. Sessions whose outbox has closed are dropped. Returns the
    /// number of sessions that received the message.
    pub async fn broadcast(&self, group: &Group, message: PopulatedMessage) -> usize {
        let mut table = self.table.write().await;

        let Some(members) = table.rooms.get(&group.id) else {
            debug!(group_id = %group.id, "[Realtime] No sessions in room");
            return 0;
        };
        let members: Vec<SessionId> = members.iter().copied().collect();

        let mut delivered = 0;
        let mut revoked = Vec::new();
        let mut closed = Vec::new();

        for session_id in members {
            let Some(session) = table.sessions.get(&session_id) else {
                closed.push(session_id);
                continue;
            };
            if can_perform(&session.actor, group, GroupAction::View).is_err() {
                revoked.push(session_id);
                continue;
            }
            let event = ServerEvent::NewMessage {
                message: message.clone(),
            };
            if session.outbox.send(event).is_ok() {
                delivered += 1;
            } else {
                closed.push(session_id);
            }
        }

        for session_id in &revoked {
            table.leave(*session_id, group.id);
        }
        for session_id in &closed {
            table.drop_session(*session_id);
            table.leave(*session_id, group.id);
        }

        if !revoked.is_empty() {
            info!(group_id = %group.id, revoked = revoked.len(), "[Realtime] Removed sessions that lost access");
        }
        info!(group_id = %group.id, delivered, "[Realtime] Message broadcast to {} sessions", delivered);
        delivered
    }

    /// Number of connected sessions
    pub async fn session_count(&self) -> usize {
        self.table.read().await.sessions.len()
    }

    /// Number of sessions currently in `group_id`'s room
    pub async fn room_size(&self, group_id: Uuid) -> usize {
        self.table
            .read()
            .await
            .rooms
            .get(&group_id)
            .map_or(0, |members| members.len())
    }
}
