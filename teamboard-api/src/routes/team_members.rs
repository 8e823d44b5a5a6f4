/// Invitation endpoints
///
/// The `:id` segment is a team id for `POST` and `GET`, and a ledger row id
/// for `PATCH`.

use crate::{
    app::AppState,
    error::ApiResult,
    response::MutationResponse,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use teamboard_shared::{
    auth::middleware::AuthContext,
    models::team_member::{InvitationStatus, TeamMember},
    services::membership::{self, AssignableMember},
};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub member_email: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub invitation_status: InvitationStatus,
}

/// `POST /team-member/:teamId`
pub async fn invite_member(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<(StatusCode, Json<MutationResponse<TeamMember>>)> {
    let row = membership::invite(&state.db, &auth, team_id, &req.member_email).await?;
    Ok((StatusCode::CREATED, Json(MutationResponse::new("Invitation sent", row))))
}

/// `PATCH /team-member/:memberId`
pub async fn respond_to_invite(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(member_id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> ApiResult<Json<MutationResponse<TeamMember>>> {
    let row = membership::respond(&state.db, &auth, member_id, req.invitation_status).await?;
    let message = format!("Invitation {}", row.invitation_status);
    Ok(Json(MutationResponse::new(message, row)))
}

/// `GET /team-member/:teamId`
pub async fn assignable_members(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(team_id): Path<Uuid>,
) -> ApiResult<Json<Vec<AssignableMember>>> {
    Ok(Json(membership::assignable_members(&state.db, &auth, team_id).await?))
}
