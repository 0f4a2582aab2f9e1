/// Realtime wire frames
///
/// Frames are JSON objects tagged by `type`:
///
/// ```text
/// client -> server   {"type":"join_room","group_id":"..."}
///                    {"type":"leave_room","group_id":"..."}
/// server -> client   {"type":"new_message","message":{...}}
///                    {"type":"room_joined","group_id":"..."}
///                    {"type":"room_left","group_id":"..."}
///                    {"type":"error","message":"..."}
/// ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::chat_message::PopulatedMessage;

/// Frames sent by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom { group_id: Uuid },
    LeaveRoom { group_id: Uuid },
}

/// Frames pushed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage { message: PopulatedMessage },
    RoomJoined { group_id: Uuid },
    RoomLeft { group_id: Uuid },
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}
