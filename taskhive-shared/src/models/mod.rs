/// Database models for TaskHive
///
/// This module contains the domain records and the PostgreSQL queries that
/// back them. Services never call these queries directly; they go through the
/// [`store`](crate::store) traits so the same logic runs against the
/// in-memory store.
///
/// # Models
///
/// - `user`: User accounts, profiles and author summaries
/// - `group`: Groups with visibility, owner and inline member set
/// - `task`: Image-carrying tasks scoped to a group
/// - `chat_message`: Per-group chat history
///
/// # Example
///
/// ```no_run
/// use taskhive_shared::models::group::{CreateGroup, Group, Visibility};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner_id: Uuid) -> Result<(), sqlx::Error> {
/// let group = Group::create(&pool, CreateGroup {
///     name: "Household".to_string(),
///     description: None,
///     visibility: Visibility::Private,
///     owner_id,
/// }).await?;
/// assert!(group.is_member(owner_id));
/// # Ok(())
/// # }
/// ```

pub mod chat_message;
pub mod group;
pub mod task;
pub mod user;
