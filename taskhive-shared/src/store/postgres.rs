/// PostgreSQL store
///
/// Thin adapter from the store traits to the queries defined on the models.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskhive_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskhive_shared::store::{postgres::PgStore, Store};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// }).await?;
/// let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{GroupStore, MessageStore, Store, StoreResult, TaskStore, UserStore};
use crate::db::pool;
use crate::models::{
    chat_message::{ChatMessage, CreateChatMessage},
    group::{CreateGroup, Group, GroupPatch},
    task::{CreateTask, Task, TaskPatch},
    user::{CreateUser, User},
};

/// Store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool, for migrations and shutdown
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        Ok(User::find_many(&self.pool, ids).await?)
    }
}

#[async_trait]
impl GroupStore for PgStore {
    async fn insert_group(&self, data: CreateGroup) -> StoreResult<Group> {
        Ok(Group::create(&self.pool, data).await?)
    }

    async fn find_group(&self, id: Uuid) -> StoreResult<Option<Group>> {
        Ok(Group::find_by_id(&self.pool, id).await?)
    }

    async fn list_visible_groups(&self, user_id: Uuid) -> StoreResult<Vec<Group>> {
        Ok(Group::list_visible(&self.pool, user_id).await?)
    }

    async fn list_all_groups(&self) -> StoreResult<Vec<Group>> {
        Ok(Group::list_all(&self.pool).await?)
    }

    async fn update_group(&self, id: Uuid, patch: GroupPatch) -> StoreResult<Option<Group>> {
        Ok(Group::update(&self.pool, id, patch).await?)
    }

    async fn add_member(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Group>> {
        Ok(Group::add_member(&self.pool, id, user_id).await?)
    }

    async fn remove_member(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Group>> {
        Ok(Group::remove_member(&self.pool, id, user_id).await?)
    }

    async fn replace_members(&self, id: Uuid, member_ids: &[Uuid]) -> StoreResult<Option<Group>> {
        Ok(Group::replace_members(&self.pool, id, member_ids).await?)
    }

    async fn delete_group_cascade(&self, id: Uuid) -> StoreResult<Option<u64>> {
        Ok(Group::delete_with_tasks(&self.pool, id).await?)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, data: CreateTask) -> StoreResult<Task> {
        Ok(Task::create(&self.pool, data).await?)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(Task::find_by_id(&self.pool, id).await?)
    }

    async fn list_tasks(&self, group_ids: Option<&[Uuid]>) -> StoreResult<Vec<Task>> {
        Ok(Task::list(&self.pool, group_ids).await?)
    }

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Option<Task>> {
        Ok(Task::update(&self.pool, id, patch).await?)
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Task::delete(&self.pool, id).await?)
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn insert_message(&self, data: CreateChatMessage) -> StoreResult<ChatMessage> {
        Ok(ChatMessage::create(&self.pool, data).await?)
    }

    async fn list_messages(&self, group_id: Uuid) -> StoreResult<Vec<ChatMessage>> {
        Ok(ChatMessage::list_by_group(&self.pool, group_id).await?)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(pool::health_check(&self.pool).await?)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
