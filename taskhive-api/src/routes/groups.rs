/// Group endpoints
///
/// # Endpoints
///
/// - `POST   /api/groups` - Create a group (caller becomes owner)
/// - `GET    /api/groups` - Public groups plus the caller's groups
/// - `GET    /api/groups/all` - Every group (admin)
/// - `PUT    /api/groups/:id` - Rename, describe or change visibility (owner/admin)
/// - `DELETE /api/groups/:id` - Delete with its tasks (owner/admin)
/// - `POST   /api/groups/:id/join` - Join a public group
/// - `POST   /api/groups/:id/leave` - Leave a group (not the owner)
/// - `PUT    /api/groups/:id/members` - Overwrite the member set (admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskhive_shared::{
    auth::middleware::AuthContext,
    groups::NewGroup,
    models::group::{Group, GroupPatch, Visibility},
};
use uuid::Uuid;
use validator::Validate;

/// Create group request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    /// Defaults to private
    #[serde(default)]
    pub visibility: Visibility,
}

/// Partial group update; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub visibility: Option<Visibility>,
}

/// Member overwrite request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMembersRequest {
    pub member_ids: Vec<Uuid>,
}

/// Plain confirmation body
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Group deletion result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteGroupResponse {
    pub message: String,
    pub deleted_tasks: u64,
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<(StatusCode, Json<Group>)> {
    req.validate().map_err(ApiError::from_validation)?;

    let group = state
        .groups
        .create(&auth.actor(), NewGroup {
            name: req.name,
            description: req.description,
            visibility: req.visibility,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn list_groups(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Group>>> {
    Ok(Json(state.groups.list_visible(&auth.actor()).await?))
}

pub async fn list_all_groups(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Group>>> {
    Ok(Json(state.groups.list_all(&auth.actor()).await?))
}

pub async fn update_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateGroupRequest>,
) -> ApiResult<Json<Group>> {
    req.validate().map_err(ApiError::from_validation)?;

    let patch = GroupPatch {
        name: req.name,
        description: req.description,
        visibility: req.visibility,
    };

    Ok(Json(state.groups.update(&auth.actor(), id, patch).await?))
}

pub async fn delete_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteGroupResponse>> {
    let deleted_tasks = state.groups.delete(&auth.actor(), id).await?;

    Ok(Json(DeleteGroupResponse {
        message: "Group removed".to_string(),
        deleted_tasks,
    }))
}

pub async fn join_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Group>> {
    Ok(Json(state.groups.join(&auth.actor(), id).await?))
}

pub async fn leave_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    state.groups.leave(&auth.actor(), id).await?;

    Ok(Json(MessageResponse {
        message: "Left group successfully".to_string(),
    }))
}

pub async fn update_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMembersRequest>,
) -> ApiResult<Json<Group>> {
    Ok(Json(
        state
            .groups
            .update_members(&auth.actor(), id, req.member_ids)
            .await?,
    ))
}
