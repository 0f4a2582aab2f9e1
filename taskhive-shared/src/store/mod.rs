/// Persistence ports for TaskHive
///
/// Each leaf component of the system (users, groups, tasks, messages) is a
/// trait here. Services hold an `Arc<dyn Store>` and never see which backend
/// is behind it.
///
/// # Implementations
///
/// - [`postgres::PgStore`]: PostgreSQL via sqlx, used in production
/// - [`memory::MemoryStore`]: process-local, used for development without a
///   database and by the test suites
///
/// # Atomicity
///
/// Single-record updates are atomic in both backends. `add_member` performs
/// its "already a member?" check in the same step as the append, and
/// `delete_group_cascade` removes the group and its tasks as one unit.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use taskhive_shared::store::{memory::MemoryStore, Store};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
/// store.health_check().await?;
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    chat_message::{ChatMessage, CreateChatMessage},
    group::{CreateGroup, Group, GroupPatch},
    task::{CreateTask, Task, TaskPatch},
    user::{CreateUser, User},
};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness rule was violated (e.g. duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The record a write depends on is gone (e.g. group deleted mid-request)
    #[error("Missing reference: {0}")]
    MissingReference(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unique").to_string();
                if constraint.contains("email") {
                    return StoreError::Conflict("Email already exists".to_string());
                }
                return StoreError::Conflict(format!("Constraint violation: {}", constraint));
            }
            if db_err.is_foreign_key_violation() {
                let constraint = db_err.constraint().unwrap_or("foreign key").to_string();
                return StoreError::MissingReference(constraint);
            }
        }
        StoreError::Database(err)
    }
}

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// User accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates a user; duplicate emails (case-insensitive) yield `Conflict`
    async fn create_user(&self, data: CreateUser) -> StoreResult<User>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Case-insensitive email lookup
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Loads the users that exist among `ids`, in no particular order
    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;
}

/// Group records and their member sets
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn insert_group(&self, data: CreateGroup) -> StoreResult<Group>;

    async fn find_group(&self, id: Uuid) -> StoreResult<Option<Group>>;

    /// Public groups plus groups `user_id` belongs to, most recently updated first
    async fn list_visible_groups(&self, user_id: Uuid) -> StoreResult<Vec<Group>>;

    /// Every group, newest first
    async fn list_all_groups(&self) -> StoreResult<Vec<Group>>;

    async fn update_group(&self, id: Uuid, patch: GroupPatch) -> StoreResult<Option<Group>>;

    /// Appends `user_id` to the member set
    ///
    /// Returns `None` if the group is missing or the user is already a member.
    async fn add_member(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Group>>;

    async fn remove_member(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Group>>;

    /// Overwrites the member set with `member_ids` as given
    async fn replace_members(&self, id: Uuid, member_ids: &[Uuid]) -> StoreResult<Option<Group>>;

    /// Deletes the group and all of its tasks as one unit
    ///
    /// Returns the number of tasks removed, or `None` if the group didn't exist.
    async fn delete_group_cascade(&self, id: Uuid) -> StoreResult<Option<u64>>;
}

/// Tasks scoped to groups
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, data: CreateTask) -> StoreResult<Task>;

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>>;

    /// Tasks newest first; `None` means every group
    async fn list_tasks(&self, group_ids: Option<&[Uuid]>) -> StoreResult<Vec<Task>>;

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Option<Task>>;

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;
}

/// Per-group chat history
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, data: CreateChatMessage) -> StoreResult<ChatMessage>;

    /// Messages oldest first, ties broken by insertion order
    async fn list_messages(&self, group_id: Uuid) -> StoreResult<Vec<ChatMessage>>;
}

/// Everything the services need from persistence
#[async_trait]
pub trait Store: UserStore + GroupStore + TaskStore + MessageStore {
    /// Verifies the backend is reachable
    async fn health_check(&self) -> StoreResult<()>;

    /// Short backend name for logs and the health endpoint
    fn backend_name(&self) -> &'static str;
}
