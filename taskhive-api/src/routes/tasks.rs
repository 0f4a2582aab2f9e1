/// Task endpoints
///
/// - `GET    /api/tasks?groupId=` - Tasks of one group, or of every group the caller can view
/// - `POST   /api/tasks` - multipart `title`, `groupId`, `image` (required)
/// - `PUT    /api/tasks/:id` - multipart `title?`, `status?`, `image?`
/// - `DELETE /api/tasks/:id`
///
/// Tasks are returned with their creator resolved under `creator`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::groups::MessageResponse,
    uploads::{self, StoredImage, UploadForm},
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use taskhive_shared::{
    auth::middleware::AuthContext,
    models::{
        task::{Task, TaskPatch, TaskStatus},
        user::UserSummary,
    },
    tasks::{NewTask, TaskError},
};
use uuid::Uuid;

/// Query string for the task list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    pub group_id: Option<Uuid>,
}

/// A task with its creator populated
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub task: Task,

    pub creator: UserSummary,
}

async fn populate(state: &AppState, tasks: Vec<Task>) -> ApiResult<Vec<TaskResponse>> {
    let mut ids: Vec<Uuid> = tasks.iter().map(|t| t.created_by).collect();
    ids.sort();
    ids.dedup();

    let creators: HashMap<Uuid, UserSummary> = state
        .store
        .find_users(&ids)
        .await?
        .iter()
        .map(|u| (u.id, UserSummary::from(u)))
        .collect();

    Ok(tasks
        .into_iter()
        .map(|task| TaskResponse {
            creator: creators
                .get(&task.created_by)
                .cloned()
                .unwrap_or_else(|| UserSummary::unknown(task.created_by)),
            task,
        })
        .collect())
}

async fn populate_one(state: &AppState, task: Task) -> ApiResult<TaskResponse> {
    populate(state, vec![task])
        .await?
        .pop()
        .ok_or_else(|| ApiError::InternalError("Task vanished while populating".to_string()))
}

fn required_uuid(form: &UploadForm, field: &'static str) -> ApiResult<Uuid> {
    let raw = form
        .text(field)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(field, format!("{} is required", field)))?;

    Uuid::parse_str(raw).map_err(|_| ApiError::validation(field, format!("{} must be a UUID", field)))
}

/// Converts a service result, removing `stored` again on failure
async fn with_image_rollback<T>(
    state: &AppState,
    stored: Option<&StoredImage>,
    result: Result<T, TaskError>,
) -> ApiResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            if let Some(image) = stored {
                uploads::discard_image(&state.config.uploads.dir, image).await;
            }
            Err(err.into())
        }
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    let tasks = state.tasks.list(&auth.actor(), query.group_id).await?;
    Ok(Json(populate(&state, tasks).await?))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let form = uploads::read_form(multipart, state.config.uploads.max_bytes).await?;

    let group_id = required_uuid(&form, "groupId")?;
    let title = form.text("title").unwrap_or_default().to_string();
    let image = form
        .image
        .as_ref()
        .ok_or_else(|| ApiError::validation(uploads::IMAGE_FIELD, "No file uploaded"))?;

    let stored = uploads::store_image(&state.config.uploads.dir, image).await?;
    let result = state
        .tasks
        .create(&auth.actor(), NewTask {
            title,
            group_id,
            image_url: Some(stored.url.clone()),
        })
        .await;
    let task = with_image_rollback(&state, Some(&stored), result).await?;

    Ok((StatusCode::CREATED, Json(populate_one(&state, task).await?)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<TaskResponse>> {
    let form = uploads::read_form(multipart, state.config.uploads.max_bytes).await?;

    let status = form
        .text("status")
        .map(|raw| raw.trim().parse::<TaskStatus>())
        .transpose()
        .map_err(|e| ApiError::validation("status", e))?;

    let stored = match form.image.as_ref() {
        Some(image) => Some(uploads::store_image(&state.config.uploads.dir, image).await?),
        None => None,
    };

    let patch = TaskPatch {
        title: form.text("title").map(|t| t.to_string()),
        status,
        image_url: stored.as_ref().map(|s| s.url.clone()),
    };

    let result = state.tasks.update(&auth.actor(), id, patch).await;
    let task = with_image_rollback(&state, stored.as_ref(), result).await?;

    Ok(Json(populate_one(&state, task).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    state.tasks.delete(&auth.actor(), id).await?;

    Ok(Json(MessageResponse {
        message: "Task removed".to_string(),
    }))
}
