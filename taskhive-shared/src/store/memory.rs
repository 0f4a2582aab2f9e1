/// In-memory store
///
/// Keeps every record in process memory behind a single `RwLock`. Each trait
/// method takes the lock once, so compound writes (membership check + append,
/// group + task cascade) are atomic with respect to other requests.
///
/// Used when no `DATABASE_URL` is configured and by the test suites. Data is
/// lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{GroupStore, MessageStore, Store, StoreError, StoreResult, TaskStore, UserStore};
use crate::models::{
    chat_message::{ChatMessage, CreateChatMessage},
    group::{CreateGroup, Group, GroupPatch, Visibility},
    task::{CreateTask, Task, TaskPatch},
    user::{CreateUser, User},
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    // Vecs keep insertion order for stable tie-breaking
    groups: Vec<Group>,
    tasks: Vec<Task>,
    messages: Vec<ChatMessage>,
    next_seq: i64,
}

impl Inner {
    fn group_mut(&mut self, id: Uuid) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == id)
    }
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;

        let taken = inner
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&data.email));
        if taken {
            return Err(StoreError::Conflict("Email already exists".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: data.email,
            display_name: data.display_name,
            password_hash: data.password_hash,
            is_admin: data.is_admin,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn insert_group(&self, data: CreateGroup) -> StoreResult<Group> {
        let mut inner = self.inner.write().await;

        if !inner.users.contains_key(&data.owner_id) {
            return Err(StoreError::MissingReference("groups_owner_id_fkey".to_string()));
        }

        let now = Utc::now();
        let group = Group {
            id: Uuid::new_v4(),
            name: data.name,
            description: data.description,
            visibility: data.visibility,
            owner_id: data.owner_id,
            member_ids: vec![data.owner_id],
            created_at: now,
            updated_at: now,
        };
        inner.groups.push(group.clone());
        Ok(group)
    }

    async fn find_group(&self, id: Uuid) -> StoreResult<Option<Group>> {
        let inner = self.inner.read().await;
        Ok(inner.groups.iter().find(|g| g.id == id).cloned())
    }

    async fn list_visible_groups(&self, user_id: Uuid) -> StoreResult<Vec<Group>> {
        let inner = self.inner.read().await;
        let mut groups: Vec<Group> = inner
            .groups
            .iter()
            .rev()
            .filter(|g| g.visibility == Visibility::Public || g.is_member(user_id))
            .cloned()
            .collect();
        groups.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(groups)
    }

    async fn list_all_groups(&self) -> StoreResult<Vec<Group>> {
        let inner = self.inner.read().await;
        let mut groups: Vec<Group> = inner.groups.iter().rev().cloned().collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(groups)
    }

    async fn update_group(&self, id: Uuid, patch: GroupPatch) -> StoreResult<Option<Group>> {
        let mut inner = self.inner.write().await;
        let Some(group) = inner.group_mut(id) else {
            return Ok(None);
        };

        if let Some(name) = patch.name {
            group.name = name;
        }
        if let Some(description) = patch.description {
            group.description = Some(description).filter(|d| !d.is_empty());
        }
        if let Some(visibility) = patch.visibility {
            group.visibility = visibility;
        }
        group.updated_at = Utc::now();

        Ok(Some(group.clone()))
    }

    async fn add_member(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Group>> {
        let mut inner = self.inner.write().await;
        let Some(group) = inner.group_mut(id) else {
            return Ok(None);
        };

        if group.is_member(user_id) {
            return Ok(None);
        }
        group.member_ids.push(user_id);
        group.updated_at = Utc::now();

        Ok(Some(group.clone()))
    }

    async fn remove_member(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Group>> {
        let mut inner = self.inner.write().await;
        let Some(group) = inner.group_mut(id) else {
            return Ok(None);
        };

        group.member_ids.retain(|m| *m != user_id);
        group.updated_at = Utc::now();

        Ok(Some(group.clone()))
    }

    async fn replace_members(&self, id: Uuid, member_ids: &[Uuid]) -> StoreResult<Option<Group>> {
        let mut inner = self.inner.write().await;
        let Some(group) = inner.group_mut(id) else {
            return Ok(None);
        };

        group.member_ids = member_ids.to_vec();
        group.updated_at = Utc::now();

        Ok(Some(group.clone()))
    }

    async fn delete_group_cascade(&self, id: Uuid) -> StoreResult<Option<u64>> {
        let mut inner = self.inner.write().await;

        let before = inner.groups.len();
        inner.groups.retain(|g| g.id != id);
        if inner.groups.len() == before {
            return Ok(None);
        }

        let tasks_before = inner.tasks.len();
        inner.tasks.retain(|t| t.group_id != id);
        Ok(Some((tasks_before - inner.tasks.len()) as u64))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, data: CreateTask) -> StoreResult<Task> {
        let mut inner = self.inner.write().await;

        if !inner.groups.iter().any(|g| g.id == data.group_id) {
            return Err(StoreError::MissingReference("tasks_group_id_fkey".to_string()));
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: data.title,
            image_url: data.image_url,
            status: Default::default(),
            group_id: data.group_id,
            created_by: data.created_by,
            created_at: now,
            updated_at: now,
        };
        inner.tasks.push(task.clone());
        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let inner = self.inner.read().await;
        Ok(inner.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks(&self, group_ids: Option<&[Uuid]>) -> StoreResult<Vec<Task>> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<Task> = inner
            .tasks
            .iter()
            .rev()
            .filter(|t| group_ids.map_or(true, |ids| ids.contains(&t.group_id)))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Option<Task>> {
        let mut inner = self.inner.write().await;
        let Some(task) = inner.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(image_url) = patch.image_url {
            task.image_url = Some(image_url);
        }
        task.updated_at = Utc::now();

        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.tasks.len();
        inner.tasks.retain(|t| t.id != id);
        Ok(inner.tasks.len() < before)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_message(&self, data: CreateChatMessage) -> StoreResult<ChatMessage> {
        let mut inner = self.inner.write().await;

        inner.next_seq += 1;
        let message = ChatMessage {
            id: Uuid::new_v4(),
            seq: inner.next_seq,
            group_id: data.group_id,
            user_id: data.user_id,
            content: data.content,
            created_at: Utc::now(),
        };
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, group_id: Uuid) -> StoreResult<Vec<ChatMessage>> {
        let inner = self.inner.read().await;
        let mut messages: Vec<ChatMessage> = inner
            .messages
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)));
        Ok(messages)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
