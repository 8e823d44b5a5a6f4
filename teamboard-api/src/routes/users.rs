/// Profile endpoints
///
/// A profile is only visible to its owner; any other id answers 404 so that
/// accounts cannot be enumerated.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::MutationResponse,
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use teamboard_shared::{
    auth::middleware::AuthContext,
    models::user::{UpdateProfile, User},
};
use uuid::Uuid;
use validator::Validate;

/// Profile edit request; the email cannot be changed
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 100))]
    pub role: Option<String>,

    #[validate(length(max = 32))]
    pub mobile_no: Option<String>,

    pub address: Option<String>,
    pub bio: Option<String>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    if id != auth.user_id {
        return Err(not_found());
    }

    let user = User::find_by_id(&state.db, id).await?.ok_or_else(not_found)?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<MutationResponse<User>>> {
    if id != auth.user_id {
        return Err(not_found());
    }
    req.validate()?;

    let user = User::update_profile(
        &state.db,
        id,
        UpdateProfile {
            name: req.name,
            role: req.role,
            mobile_no: req.mobile_no,
            address: req.address,
            bio: req.bio,
        },
    )
    .await?
    .ok_or_else(not_found)?;

    tracing::info!(user_id = %id, "Profile updated");
    Ok(Json(MutationResponse::new("Profile updated", user)))
}
