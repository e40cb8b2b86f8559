use axum::{extract::State, Json};
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::error::{ApiError, ApiResult};
use crate::services::Profile;

/// Get the profile of the authenticated user
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> ApiResult<Json<Profile>> {
    let profile = state
        .profiles
        .find_by_user_id(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    Ok(Json(profile))
}
