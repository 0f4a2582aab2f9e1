/// Task service
///
/// Tasks inherit their permissions from the group they belong to: reading
/// needs `View` on it, every mutation needs `PostTask`.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::auth::authorization::{can_perform, Actor, AuthzError, GroupAction};
use crate::models::task::{CreateTask, Task, TaskPatch};
use crate::store::{Store, StoreError};

/// Longest accepted task title, in characters
pub const MAX_TASK_TITLE_LENGTH: usize = 200;

/// Error type for task operations
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task not found")]
    NotFound,

    #[error("Group not found")]
    GroupNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error(transparent)]
    Store(StoreError),
}

impl From<AuthzError> for TaskError {
    fn from(err: AuthzError) -> Self {
        TaskError::Forbidden(err.to_string())
    }
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            // Group removed between the check and the insert
            StoreError::MissingReference(_) => TaskError::GroupNotFound,
            other => TaskError::Store(other),
        }
    }
}

/// Input for [`TaskService::create`]
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub group_id: Uuid,
    pub image_url: Option<String>,
}

fn normalize_title(title: &str) -> Result<String, TaskError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TaskError::Validation {
            field: "title",
            message: "Title is required".to_string(),
        });
    }
    if title.chars().count() > MAX_TASK_TITLE_LENGTH {
        return Err(TaskError::Validation {
            field: "title",
            message: format!("Title must be at most {} characters", MAX_TASK_TITLE_LENGTH),
        });
    }
    Ok(title.to_string())
}

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn Store>,
}

impl TaskService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn check_group(
        &self,
        actor: &Actor,
        group_id: Uuid,
        action: GroupAction,
    ) -> Result<(), TaskError> {
        let group = self
            .store
            .find_group(group_id)
            .await?
            .ok_or(TaskError::GroupNotFound)?;
        can_perform(actor, &group, action)?;
        Ok(())
    }

    async fn load(&self, task_id: Uuid) -> Result<Task, TaskError> {
        self.store
            .find_task(task_id)
            .await?
            .ok_or(TaskError::NotFound)
    }

    pub async fn create(&self, actor: &Actor, input: NewTask) -> Result<Task, TaskError> {
        self.check_group(actor, input.group_id, GroupAction::PostTask)
            .await?;
        let title = normalize_title(&input.title)?;

        let task = self
            .store
            .insert_task(CreateTask {
                title,
                image_url: input.image_url,
                group_id: input.group_id,
                created_by: actor.user_id,
            })
            .await?;

        info!(task_id = %task.id, group_id = %task.group_id, created_by = %actor.user_id, "Task created");
        Ok(task)
    }

    /// Lists tasks newest first
    ///
    /// With a group filter the actor needs `View` on that group; without one,
    /// tasks of every group the actor can view are returned (all for admins).
    pub async fn list(&self, actor: &Actor, group_id: Option<Uuid>) -> Result<Vec<Task>, TaskError> {
        if let Some(group_id) = group_id {
            self.check_group(actor, group_id, GroupAction::View).await?;
            return Ok(self.store.list_tasks(Some(&[group_id][..])).await?);
        }

        if actor.is_admin {
            return Ok(self.store.list_tasks(None).await?);
        }

        let member_of: Vec<Uuid> = self
            .store
            .list_visible_groups(actor.user_id)
            .await?
            .into_iter()
            .filter(|g| g.is_member(actor.user_id))
            .map(|g| g.id)
            .collect();

        if member_of.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.list_tasks(Some(&member_of)).await?)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        task_id: Uuid,
        mut patch: TaskPatch,
    ) -> Result<Task, TaskError> {
        let task = self.load(task_id).await?;
        self.check_group(actor, task.group_id, GroupAction::PostTask)
            .await?;

        if let Some(title) = patch.title.take() {
            patch.title = Some(normalize_title(&title)?);
        }

        let task = self
            .store
            .update_task(task_id, patch)
            .await?
            .ok_or(TaskError::NotFound)?;

        info!(task_id = %task.id, actor_id = %actor.user_id, status = task.status.as_str(), "Task updated");
        Ok(task)
    }

    pub async fn delete(&self, actor: &Actor, task_id: Uuid) -> Result<(), TaskError> {
        let task = self.load(task_id).await?;
        self.check_group(actor, task.group_id, GroupAction::PostTask)
            .await?;

        if !self.store.delete_task(task_id).await? {
            return Err(TaskError::NotFound);
        }

        info!(task_id = %task_id, actor_id = %actor.user_id, "Task deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::{GroupService, NewGroup};
    use crate::models::group::Visibility;
    use crate::models::task::TaskStatus;
    use crate::models::user::CreateUser;
    use crate::store::{memory::MemoryStore, UserStore};

    struct Harness {
        tasks: TaskService,
        groups: GroupService,
        store: Arc<MemoryStore>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        Harness {
            tasks: TaskService::new(store.clone()),
            groups: GroupService::new(store.clone()),
            store,
        }
    }

    async fn actor(h: &Harness, name: &str, is_admin: bool) -> Actor {
        let user = h
            .store
            .create_user(CreateUser {
                email: format!("{}@example.com", name),
                display_name: name.to_string(),
                password_hash: "hash".to_string(),
                is_admin,
            })
            .await
            .unwrap();
        Actor {
            user_id: user.id,
            is_admin,
        }
    }

    async fn group(h: &Harness, owner: &Actor, visibility: Visibility) -> Uuid {
        h.groups
            .create(owner, NewGroup {
                name: "g".to_string(),
                description: None,
                visibility,
            })
            .await
            .unwrap()
            .id
    }

    fn new_task(group_id: Uuid, title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            group_id,
            image_url: Some("/uploads/a.png".to_string()),
        }
    }

    #[tokio::test]
    async fn test_members_create_outsiders_cannot() {
        let h = harness();
        let alice = actor(&h, "alice", false).await;
        let bob = actor(&h, "bob", false).await;
        let g = group(&h, &alice, Visibility::Public).await;

        let task = h.tasks.create(&alice, new_task(g, "  Buy milk ")).await.unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.created_by, alice.user_id);

        assert!(matches!(
            h.tasks.create(&bob, new_task(g, "x")).await,
            Err(TaskError::Forbidden(_))
        ));
        assert!(matches!(
            h.tasks.create(&alice, new_task(Uuid::new_v4(), "x")).await,
            Err(TaskError::GroupNotFound)
        ));
        assert!(matches!(
            h.tasks.create(&alice, new_task(g, "   ")).await,
            Err(TaskError::Validation { field: "title", .. })
        ));
        // Membership is checked before the title
        assert!(matches!(
            h.tasks.create(&bob, new_task(g, "   ")).await,
            Err(TaskError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_list_scopes_to_viewable_groups() {
        let h = harness();
        let alice = actor(&h, "alice", false).await;
        let bob = actor(&h, "bob", false).await;
        let root = actor(&h, "root", true).await;
        let mine = group(&h, &alice, Visibility::Private).await;
        let theirs = group(&h, &bob, Visibility::Public).await;

        h.tasks.create(&alice, new_task(mine, "a1")).await.unwrap();
        h.tasks.create(&alice, new_task(mine, "a2")).await.unwrap();
        h.tasks.create(&bob, new_task(theirs, "b1")).await.unwrap();

        let titles: Vec<String> = h
            .tasks
            .list(&alice, None)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles.len(), 2);
        assert!(titles.iter().all(|t| t.starts_with('a')));

        assert!(matches!(
            h.tasks.list(&alice, Some(theirs)).await,
            Err(TaskError::Forbidden(_))
        ));
        assert_eq!(h.tasks.list(&bob, Some(theirs)).await.unwrap().len(), 1);
        assert_eq!(h.tasks.list(&root, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete_require_membership() {
        let h = harness();
        let alice = actor(&h, "alice", false).await;
        let bob = actor(&h, "bob", false).await;
        let g = group(&h, &alice, Visibility::Public).await;
        let task = h.tasks.create(&alice, new_task(g, "t")).await.unwrap();

        let done = TaskPatch {
            status: Some(TaskStatus::Done),
            ..Default::default()
        };
        assert!(matches!(
            h.tasks.update(&bob, task.id, done.clone()).await,
            Err(TaskError::Forbidden(_))
        ));

        h.groups.join(&bob, g).await.unwrap();
        let updated = h.tasks.update(&bob, task.id, done).await.unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(updated.title, "t");

        h.tasks.delete(&bob, task.id).await.unwrap();
        assert!(matches!(
            h.tasks.delete(&bob, task.id).await,
            Err(TaskError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_group_delete_empties_task_list() {
        let h = harness();
        let alice = actor(&h, "alice", false).await;
        let g = group(&h, &alice, Visibility::Private).await;
        h.tasks.create(&alice, new_task(g, "t")).await.unwrap();

        h.groups.delete(&alice, g).await.unwrap();

        assert!(h.tasks.list(&alice, None).await.unwrap().is_empty());
        assert!(matches!(
            h.tasks.list(&alice, Some(g)).await,
            Err(TaskError::GroupNotFound)
        ));
    }
}
