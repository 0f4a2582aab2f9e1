/// Chat endpoints
///
/// - `GET  /api/chat/:group_id/messages` - History, oldest first
/// - `POST /api/chat/:group_id/messages` - Send; also pushed to the group's realtime room
///
/// Both require the caller to be a member of the group (or an admin).

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use taskhive_shared::{auth::middleware::AuthContext, models::chat_message::PopulatedMessage};
use uuid::Uuid;
use validator::Validate;

/// Send message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, message = "Message content is required"))]
    pub content: String,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PopulatedMessage>>> {
    Ok(Json(state.chat.history(&auth.actor(), group_id).await?))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<PopulatedMessage>)> {
    req.validate().map_err(ApiError::from_validation)?;

    let message = state.chat.send(&auth.actor(), group_id, &req.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
