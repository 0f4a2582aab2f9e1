/// Group chat
///
/// Sending a message persists it first and only then fans it out, so
/// everything a client receives over the realtime channel is also in the
/// history returned by [`ChatService::history`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use taskhive_shared::auth::authorization::Actor;
/// use taskhive_shared::chat::ChatService;
/// use taskhive_shared::groups::{GroupService, NewGroup};
/// use taskhive_shared::models::{group::Visibility, user::CreateUser};
/// use taskhive_shared::realtime::Notifier;
/// use taskhive_shared::store::{memory::MemoryStore, UserStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::new());
/// let notifier = Arc::new(Notifier::new());
/// let user = store.create_user(CreateUser {
///     email: "a@example.com".to_string(),
///     display_name: "A".to_string(),
///     password_hash: "hash".to_string(),
///     is_admin: false,
/// }).await?;
/// let actor = Actor::user(user.id);
///
/// let group = GroupService::new(store.clone())
///     .create(&actor, NewGroup { name: "G".to_string(), description: None, visibility: Visibility::Public })
///     .await?;
///
/// let chat = ChatService::new(store, notifier);
/// chat.send(&actor, group.id, "hello").await?;
/// assert_eq!(chat.history(&actor, group.id).await?.len(), 1);
/// # Ok(())
/// # }
/// ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::authorization::{can_perform, Actor, AuthzError, GroupAction};
use crate::models::chat_message::{CreateChatMessage, PopulatedMessage};
use crate::models::group::Group;
use crate::models::user::UserSummary;
use crate::realtime::{Notifier, RealtimeError, SessionId};
use crate::store::{Store, StoreError};

/// Longest accepted message, in characters
pub const MAX_MESSAGE_LENGTH: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Group not found")]
    GroupNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AuthzError> for ChatError {
    fn from(err: AuthzError) -> Self {
        ChatError::Forbidden(err.to_string())
    }
}

/// Chat send/history plus realtime room brokering
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn Store>,
    notifier: Arc<Notifier>,
}

impl ChatService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    async fn authorized_group(
        &self,
        actor: &Actor,
        group_id: Uuid,
        action: GroupAction,
    ) -> Result<Group, ChatError> {
        let group = self
            .store
            .find_group(group_id)
            .await?
            .ok_or(ChatError::GroupNotFound)?;
        can_perform(actor, &group, action)?;
        Ok(group)
    }

    /// Persists a message and pushes it to the group's room
    ///
    /// Once the message is stored the call succeeds; a failed author lookup
    /// falls back to a placeholder summary.
    pub async fn send(
        &self,
        actor: &Actor,
        group_id: Uuid,
        content: &str,
    ) -> Result<PopulatedMessage, ChatError> {
        let group = self
            .authorized_group(actor, group_id, GroupAction::PostMessage)
            .await?;

        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::Validation("Message content is required".to_string()));
        }
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::Validation(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        let message = self
            .store
            .insert_message(CreateChatMessage {
                group_id,
                user_id: actor.user_id,
                content: content.to_string(),
            })
            .await?;

        let author = match self.summary(actor.user_id).await {
            Ok(author) => author,
            Err(e) => {
                warn!(error = %e, message_id = %message.id, "Author lookup failed after send");
                UserSummary::unknown(actor.user_id)
            }
        };
        let populated = PopulatedMessage::new(message, author);

        let delivered = self.notifier.broadcast(&group, populated.clone()).await;

        info!(message_id = %populated.id, group_id = %group_id, author_id = %actor.user_id, delivered, "Chat message sent");
        Ok(populated)
    }

    /// Messages of a group, oldest first, with authors resolved
    pub async fn history(&self, actor: &Actor, group_id: Uuid) -> Result<Vec<PopulatedMessage>, ChatError> {
        self.authorized_group(actor, group_id, GroupAction::View)
            .await?;

        let messages = self.store.list_messages(group_id).await?;

        let mut author_ids: Vec<Uuid> = messages.iter().map(|m| m.user_id).collect();
        author_ids.sort();
        author_ids.dedup();
        let authors: HashMap<Uuid, UserSummary> = self
            .store
            .find_users(&author_ids)
            .await?
            .iter()
            .map(|u| (u.id, UserSummary::from(u)))
            .collect();

        Ok(messages
            .into_iter()
            .map(|m| {
                let author = authors
                    .get(&m.user_id)
                    .cloned()
                    .unwrap_or_else(|| UserSummary::unknown(m.user_id));
                PopulatedMessage::new(m, author)
            })
            .collect())
    }

    async fn summary(&self, user_id: Uuid) -> Result<UserSummary, ChatError> {
        Ok(self
            .store
            .find_user(user_id)
            .await?
            .map(|u| UserSummary::from(&u))
            .unwrap_or_else(|| UserSummary::unknown(user_id)))
    }

    /// Resolves the group and places the session in its room
    ///
    /// Failures are reported to the session as `error` frames.
    pub async fn join_room(&self, session: SessionId, group_id: Uuid) -> Result<(), RealtimeError> {
        let failure = match self.store.find_group(group_id).await {
            Ok(Some(group)) => return self.notifier.join_room(session, &group).await,
            Ok(None) => RealtimeError::GroupNotFound,
            Err(e) => {
                error!(error = %e, group_id = %group_id, "Failed to load group for room join");
                RealtimeError::Internal
            }
        };

        self.notifier.send_error(session, failure.to_string()).await;
        Err(failure)
    }

    pub async fn leave_room(&self, session: SessionId, group_id: Uuid) -> Result<(), RealtimeError> {
        debug!(session_id = %session, group_id = %group_id, "Leaving room");
        self.notifier.leave_room(session, group_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::{GroupService, NewGroup};
    use crate::models::group::Visibility;
    use crate::models::user::CreateUser;
    use crate::realtime::ServerEvent;
    use crate::store::{memory::MemoryStore, UserStore};

    struct Harness {
        store: Arc<MemoryStore>,
        groups: GroupService,
        chat: ChatService,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(Notifier::new());
        Harness {
            groups: GroupService::new(store.clone()),
            chat: ChatService::new(store.clone(), notifier),
            store,
        }
    }

    async fn actor(h: &Harness, name: &str) -> Actor {
        let user = h
            .store
            .create_user(CreateUser {
                email: format!("{}@example.com", name),
                display_name: name.to_string(),
                password_hash: "hash".to_string(),
                is_admin: false,
            })
            .await
            .unwrap();
        Actor::user(user.id)
    }

    async fn public_group(h: &Harness, owner: &Actor) -> Uuid {
        h.groups
            .create(owner, NewGroup {
                name: "g".to_string(),
                description: None,
                visibility: Visibility::Public,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_send_populates_author_and_orders_history() {
        let h = harness();
        let alice = actor(&h, "alice").await;
        let g = public_group(&h, &alice).await;

        let sent = h.chat.send(&alice, g, "  hello  ").await.unwrap();
        assert_eq!(sent.content, "hello");
        assert_eq!(sent.author.display_name, "alice");

        h.chat.send(&alice, g, "second").await.unwrap();
        h.chat.send(&alice, g, "third").await.unwrap();

        let history: Vec<String> = h
            .chat
            .history(&alice, g)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(history, vec!["hello", "second", "third"]);
    }

    #[tokio::test]
    async fn test_non_member_cannot_send_or_read() {
        let h = harness();
        let alice = actor(&h, "alice").await;
        let bob = actor(&h, "bob").await;
        let g = public_group(&h, &alice).await;

        assert!(matches!(
            h.chat.send(&bob, g, "hi").await,
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            h.chat.history(&bob, g).await,
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            h.chat.send(&alice, g, "   ").await,
            Err(ChatError::Validation(_))
        ));
        assert!(matches!(
            h.chat.send(&bob, g, "   ").await,
            Err(ChatError::Forbidden(_))
        ));
        assert!(matches!(
            h.chat.send(&alice, Uuid::new_v4(), "hi").await,
            Err(ChatError::GroupNotFound)
        ));
    }

    #[tokio::test]
    async fn test_stored_message_is_returned_even_without_author_record() {
        let h = harness();
        let alice = actor(&h, "alice").await;
        let g = public_group(&h, &alice).await;
        let ghost = Actor {
            user_id: Uuid::new_v4(),
            is_admin: true,
        };

        let sent = h.chat.send(&ghost, g, "from nowhere").await.unwrap();
        assert_eq!(sent.author, UserSummary::unknown(ghost.user_id));

        let history = h.chat.history(&alice, g).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, sent.id);
    }

    #[tokio::test]
    async fn test_send_reaches_joined_sessions_including_senders_other_tabs() {
        let h = harness();
        let alice = actor(&h, "alice").await;
        let bob = actor(&h, "bob").await;
        let g = public_group(&h, &alice).await;
        h.groups.join(&bob, g).await.unwrap();

        let notifier = h.chat.notifier().clone();
        let (alice_tab, mut alice_rx) = notifier.connect(alice).await;
        let (bob_tab, mut bob_rx) = notifier.connect(bob).await;
        h.chat.join_room(alice_tab, g).await.unwrap();
        h.chat.join_room(bob_tab, g).await.unwrap();

        let sent = h.chat.send(&alice, g, "hey").await.unwrap();

        for rx in [&mut alice_rx, &mut bob_rx] {
            assert_eq!(rx.recv().await, Some(ServerEvent::RoomJoined { group_id: g }));
            assert_eq!(
                rx.recv().await,
                Some(ServerEvent::NewMessage { message: sent.clone() })
            );
        }
    }

    #[tokio::test]
    async fn test_left_member_no_longer_receives() {
        let h = harness();
        let alice = actor(&h, "alice").await;
        let bob = actor(&h, "bob").await;
        let g = public_group(&h, &alice).await;
        h.groups.join(&bob, g).await.unwrap();

        let notifier = h.chat.notifier().clone();
        let (bob_tab, mut bob_rx) = notifier.connect(bob).await;
        h.chat.join_room(bob_tab, g).await.unwrap();

        h.groups.leave(&bob, g).await.unwrap();
        h.chat.send(&alice, g, "after leave").await.unwrap();

        assert_eq!(bob_rx.recv().await, Some(ServerEvent::RoomJoined { group_id: g }));
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_unknown_group_reports_error() {
        let h = harness();
        let alice = actor(&h, "alice").await;
        let (tab, mut rx) = h.chat.notifier().connect(alice).await;

        assert!(h.chat.join_room(tab, Uuid::new_v4()).await.is_err());
        assert!(matches!(rx.recv().await, Some(ServerEvent::Error { .. })));
    }
}
