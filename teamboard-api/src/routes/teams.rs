/// Team endpoints
///
/// - `POST /teams` - Create a team owned by the caller
/// - `GET /teams` - Owned teams with their ledgers, plus invitations
/// - `GET /teams/:id` - Roster of one team
/// - `DELETE /teams/:id` - Delete an owned team with no projects

use crate::{
    app::AppState,
    error::ApiResult,
    response::MutationResponse,
    routes::PaginationParams,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use teamboard_shared::{
    auth::middleware::AuthContext,
    models::team::Team,
    pagination::PageRequest,
    services::{
        membership::{self, InvitedTeam, RosterView},
        teams::{self, TeamWithMembers, TeamsOverview},
    },
};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamsPagination {
    pub current_page: u32,
    pub total_team_pages: u64,
    pub total_invited_team_pages: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamsResponse {
    pub team_with_users: Vec<TeamWithMembers>,
    pub invited_teams: Vec<InvitedTeam>,
    pub pagination: TeamsPagination,
}

impl From<TeamsOverview> for TeamsResponse {
    fn from(overview: TeamsOverview) -> Self {
        Self {
            pagination: TeamsPagination {
                current_page: overview.owned.current_page,
                total_team_pages: overview.owned.total_pages,
                total_invited_team_pages: overview.invited.total_pages,
            },
            team_with_users: overview.owned.items,
            invited_teams: overview.invited.items,
        }
    }
}

pub async fn create_team(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<MutationResponse<Team>>)> {
    let team = teams::create_team(&state.db, &auth, &req.name, &req.description).await?;
    Ok((StatusCode::CREATED, Json(MutationResponse::new("Team created", team))))
}

pub async fn list_teams(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<TeamsResponse>> {
    let page = PageRequest::from(params);
    let overview = teams::list_teams(&state.db, &auth, page).await?;
    Ok(Json(overview.into()))
}

pub async fn team_roster(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RosterView>> {
    Ok(Json(membership::roster(&state.db, &auth, id).await?))
}

pub async fn delete_team(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MutationResponse<()>>> {
    teams::delete_team(&state.db, &auth, id).await?;
    Ok(Json(MutationResponse::done("Team deleted")))
}
