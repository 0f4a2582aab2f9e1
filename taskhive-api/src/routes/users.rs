/// User endpoints
///
/// - `POST /api/users/register` - Create an account and get a token
/// - `POST /api/users/login` - Exchange credentials for a token
/// - `GET  /api/users/profile` - Current user
///
/// Tokens are HS256 JWTs valid for 30 days. Emails listed in `ADMIN_EMAILS`
/// are registered with the admin flag.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use taskhive_shared::{
    auth::{
        jwt::{self, Claims},
        middleware::AuthContext,
        password,
    },
    models::user::{CreateUser, User, UserProfile},
};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Display name must be 1 to 100 characters"))]
    pub display_name: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Returned by register and login
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
}

fn issue_token(state: &AppState, user: &User) -> ApiResult<AuthResponse> {
    let token = jwt::create_token(&Claims::new(user.id, user.is_admin), state.jwt_secret())?;
    Ok(AuthResponse {
        user: UserProfile::from(user),
        token,
    })
}

/// Register a new user
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `409 Conflict`: Email already exists
pub async fn register(
    State(state): State<AppState>,
    Json(mut req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.email = req.email.trim().to_lowercase();
    req.display_name = req.display_name.trim().to_string();
    req.validate().map_err(ApiError::from_validation)?;

    // Argon2 is CPU-bound; keep it off the async workers
    let plain = req.password;
    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| ApiError::InternalError(format!("Hashing task failed: {}", e)))??;

    let is_admin = state.config.is_admin_email(&req.email);
    let user = state
        .store
        .create_user(CreateUser {
            email: req.email,
            display_name: req.display_name,
            password_hash,
            is_admin,
        })
        .await?;

    tracing::info!(user_id = %user.id, is_admin, "User registered");
    Ok((StatusCode::CREATED, Json(issue_token(&state, &user)?)))
}

/// Login endpoint
///
/// Unknown email and wrong password produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate().map_err(ApiError::from_validation)?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .store
        .find_user_by_email(req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    let hash = user.password_hash.clone();
    let plain = req.password;
    let valid = tokio::task::spawn_blocking(move || password::verify_password(&plain, &hash))
        .await
        .map_err(|e| ApiError::InternalError(format!("Verification task failed: {}", e)))??;

    if !valid {
        tracing::debug!(user_id = %user.id, "Login rejected: password mismatch");
        return Err(invalid());
    }

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(issue_token(&state, &user)?))
}

/// Current user's profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .store
        .find_user(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserProfile::from(&user)))
}
