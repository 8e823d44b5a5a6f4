/// Project endpoints
///
/// - `POST /projects` - Create a project attached to one or more teams
/// - `GET /projects` - Owned and collaborating projects, plus attachable teams

use crate::{app::AppState, error::ApiResult, response::MutationResponse};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use teamboard_shared::{
    auth::middleware::AuthContext,
    models::{project::ProjectWithTeams, team::TeamSummary},
    services::projects,
};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ProjectFields {
    pub name: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub project: ProjectFields,

    #[serde(default)]
    pub teams: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsResponse {
    pub projects: Vec<ProjectWithTeams>,
    pub collaborating_projects: Vec<ProjectWithTeams>,
    pub teams: Vec<TeamSummary>,
}

pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<MutationResponse<ProjectWithTeams>>)> {
    let project = projects::create_project(
        &state.db,
        &auth,
        &req.project.name,
        &req.project.description,
        &req.teams,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(MutationResponse::new("Project created", project))))
}

pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<ProjectsResponse>> {
    let overview = projects::list_projects(&state.db, &auth).await?;

    Ok(Json(ProjectsResponse {
        projects: overview.listing.owned,
        collaborating_projects: overview.listing.collaborating,
        teams: overview.teams,
    }))
}
