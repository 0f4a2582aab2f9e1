/// Realtime channel
///
/// `GET /api/realtime?token=<jwt>` upgrades to a WebSocket. Browsers cannot
/// set headers on the upgrade request, so the token may ride in the query
/// string; an `Authorization: Bearer` header is accepted as well.
///
/// Each socket becomes one notifier session. Client frames (`join_room`,
/// `leave_room`) are handled as they arrive; server frames are drained from
/// the session outbox in order. Closing the socket drops the session and all
/// of its rooms.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use taskhive_shared::{
    auth::middleware::{authenticate, bearer_token, AuthContext, AuthError},
    chat::ChatService,
    realtime::{ClientEvent, SessionId},
};
use tracing::{debug, error, info};

/// Upgrade query string
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// Authenticates and upgrades the connection
pub async fn connect(
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let token = match query.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => bearer_token(&headers)?.ok_or(AuthError::MissingCredentials)?,
    };
    let auth = authenticate(token, state.jwt_secret())?;

    Ok(ws.on_upgrade(move |socket| run_session(state, auth, socket)))
}

async fn run_session(state: AppState, auth: AuthContext, socket: WebSocket) {
    let notifier = state.notifier().clone();
    let (session, mut outbox) = notifier.connect(auth.actor()).await;
    info!(session_id = %session, user_id = %auth.user_id, "[Realtime] Socket opened");

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "[Realtime] Failed to encode frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let chat = state.chat.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => handle_frame(&chat, session, &text).await,
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    notifier.disconnect(session).await;
    info!(session_id = %session, user_id = %auth.user_id, "[Realtime] Socket closed");
}

/// Applies one client frame to the session
///
/// Unparseable frames and refused joins are answered with `error` frames.
pub async fn handle_frame(chat: &ChatService, session: SessionId, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(session_id = %session, error = %e, "[Realtime] Bad client frame");
            chat.notifier()
                .send_error(session, format!("Invalid frame: {}", e))
                .await;
            return;
        }
    };

    let result = match event {
        ClientEvent::JoinRoom { group_id } => chat.join_room(session, group_id).await,
        ClientEvent::LeaveRoom { group_id } => chat.leave_room(session, group_id).await,
    };

    if let Err(e) = result {
        debug!(session_id = %session, error = %e, "[Realtime] Frame rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use taskhive_shared::{
        auth::authorization::Actor,
        groups::{GroupService, NewGroup},
        models::{group::Visibility, user::CreateUser},
        realtime::{Notifier, ServerEvent},
        store::{memory::MemoryStore, UserStore},
    };

    #[tokio::test]
    async fn test_frames_join_and_leave_rooms() {
        let store = Arc::new(MemoryStore::new());
        let chat = ChatService::new(store.clone(), Arc::new(Notifier::new()));
        let user = store
            .create_user(CreateUser {
                email: "a@example.com".to_string(),
                display_name: "A".to_string(),
                password_hash: "hash".to_string(),
                is_admin: false,
            })
            .await
            .unwrap();
        let actor = Actor::user(user.id);
        let group = GroupService::new(store.clone())
            .create(&actor, NewGroup {
                name: "g".to_string(),
                description: None,
                visibility: Visibility::Private,
            })
            .await
            .unwrap();

        let (session, mut rx) = chat.notifier().connect(actor).await;

        handle_frame(&chat, session, "not json").await;
        assert!(matches!(rx.recv().await, Some(ServerEvent::Error { .. })));

        let join = format!(r#"{{"type":"join_room","group_id":"{}"}}"#, group.id);
        handle_frame(&chat, session, &join).await;
        assert_eq!(rx.recv().await, Some(ServerEvent::RoomJoined { group_id: group.id }));
        assert_eq!(chat.notifier().room_size(group.id).await, 1);

        let leave = format!(r#"{{"type":"leave_room","group_id":"{}"}}"#, group.id);
        handle_frame(&chat, session, &leave).await;
        assert_eq!(rx.recv().await, Some(ServerEvent::RoomLeft { group_id: group.id }));
        assert_eq!(chat.notifier().room_size(group.id).await, 0);
    }
}
