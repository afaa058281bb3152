//! User administration and profile endpoints

use axum::{
    extract::State,
    Json,
};
use shared::{require_non_empty, UpdateProfileRequest, UpdateUserRequest, UserInfo};
use uuid::Uuid;

use crate::{
    error::AppError,
    extract::{AppJson, AppPath},
    routes::auth::CurrentUser,
    state::AppState,
};

/// List all users (admin only)
/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<UserInfo>>, AppError> {
    current.require_admin()?;
    let users = state.db.list_users().await?;
    Ok(Json(users.iter().map(|u| u.info()).collect()))
}

/// Change role, status or department of a user (admin only)
/// PATCH /users/:id
pub async fn update_user(
    State(state): State<AppState>,
    current: CurrentUser,
    AppPath(user_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> Result<Json<UserInfo>, AppError> {
    current.require_admin()?;
    let user_id = user_id.to_string();

    if user_id == current.id() && (req.role.is_some() || req.status.is_some()) {
        return Err(AppError::BadRequest(
            "Administrators cannot change their own role or status".to_string(),
        ));
    }

    let role = req.role.map(|r| r.to_string());
    let status = req.status.map(|s| s.to_string());
    let updated = state
        .db
        .update_user_admin(&user_id, role.as_deref(), status.as_deref(), req.department.as_deref())
        .await?;
    if !updated {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let user = state
        .db
        .get_user_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!(
        "User {} updated by {}: role={}, status={}",
        user.email,
        current.user.email,
        user.role,
        user.status
    );

    Ok(Json(user.info()))
}

/// Edit own profile
/// PATCH /users/me
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> Result<Json<UserInfo>, AppError> {
    if let Some(name) = &req.display_name {
        require_non_empty("display_name", name)?;
    }

    let display_name = req.display_name.as_deref().map(str::trim);
    state
        .db
        .update_profile(current.id(), display_name, req.department.as_deref())
        .await?;

    let user = state
        .db
        .get_user_by_id(current.id())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user.info()))
}
