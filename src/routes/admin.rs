//! Admin routes, gated on the `admin` role carried by the session token.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::RequireAdmin;
use crate::error::ApiResult;
use crate::services::User;

#[derive(Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
) -> ApiResult<Json<UserListResponse>> {
    tracing::debug!(admin = %admin.sub, "Admin user listing");

    let users = state.users.list(100).await?;
    Ok(Json(UserListResponse { users }))
}
