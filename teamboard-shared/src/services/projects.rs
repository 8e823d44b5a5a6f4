/// Project registry workflows
///
/// The project row and its team associations are written in one
/// transaction, so a project never exists without at least one team.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::authorization::{authorize, can_access, Action, MembershipSnapshot, ProjectRef, Resource};
use crate::auth::middleware::AuthContext;
use crate::error::{is_foreign_key_violation, DomainError, DomainResult};
use crate::models::project::{dedup_team_ids, CreateProject, Project, ProjectListing, ProjectWithTeams};
use crate::models::team::{Team, TeamSummary};
use crate::services::{required, retry_read};

/// Everything the projects page needs
#[derive(Debug, Clone, Serialize)]
pub struct ProjectsOverview {
    pub listing: ProjectListing,

    /// Teams a new project may be attached to
    pub teams: Vec<TeamSummary>,
}

/// Creates a project attached to `team_ids`
///
/// # Errors
///
/// - `Validation` for a blank name
/// - `InvalidAssociation` for an empty team list
/// - `NotFound` for a team that does not exist or is invisible to the caller
/// - `NotAuthorized` when the caller lacks standing on a listed team
pub async fn create_project(
    pool: &PgPool,
    auth: &AuthContext,
    name: &str,
    description: &str,
    team_ids: &[Uuid],
) -> DomainResult<ProjectWithTeams> {
    let name = required("name", name)?;
    let team_ids = dedup_team_ids(team_ids);
    if team_ids.is_empty() {
        return Err(DomainError::InvalidAssociation(
            "A project must be attached to at least one team".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let snapshot = MembershipSnapshot::load(&mut tx, auth.user_id, &auth.email).await?;

    let teams = Team::find_many(&mut *tx, &team_ids).await?;
    if teams.len() != team_ids.len() {
        return Err(DomainError::NotFound("Team"));
    }
    for team in &teams {
        if !can_access(&snapshot, &Resource::Team(team.gate_ref()), Action::View) {
            return Err(DomainError::NotFound("Team"));
        }
    }

    authorize(
        &snapshot,
        &Resource::Project(ProjectRef {
            created_by: None,
            team_ids: &team_ids,
        }),
        Action::Create,
    )?;

    let project = Project::create(
        &mut *tx,
        CreateProject {
            name,
            description: description.to_string(),
            created_by: auth.user_id,
        },
    )
    .await?;

    Project::attach_teams(&mut *tx, project.id, &team_ids)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                DomainError::NotFound("Team")
            } else {
                DomainError::Database(e)
            }
        })?;

    let mut entries = Project::team_entries(&mut *tx, &[project.id]).await?;

    tx.commit().await?;

    info!(
        project_id = %project.id,
        teams = team_ids.len(),
        created_by = %auth.user_id,
        "Project created"
    );

    let project_teams = entries.remove(&project.id).unwrap_or_default();
    Ok(project.with_teams(project_teams))
}

/// Owned and collaborating projects, plus the teams the caller can attach
pub async fn list_projects(pool: &PgPool, auth: &AuthContext) -> DomainResult<ProjectsOverview> {
    retry_read("list_projects", move || async move {
        let mut conn = pool.acquire().await?;
        let snapshot = MembershipSnapshot::load(&mut conn, auth.user_id, &auth.email).await?;

        let listing = visible_projects(&mut conn, &snapshot).await?;

        let standing: Vec<Uuid> = snapshot.standing_teams().into_iter().collect();
        let teams = Team::find_many(&mut *conn, &standing)
            .await?
            .into_iter()
            .map(|t| TeamSummary { id: t.id, name: t.name })
            .collect();

        Ok(ProjectsOverview { listing, teams })
    })
    .await
}

/// Projects visible to the snapshot's user, with their teams expanded
pub(crate) async fn visible_projects(
    conn: &mut PgConnection,
    snapshot: &MembershipSnapshot,
) -> DomainResult<ProjectListing> {
    let standing: HashSet<Uuid> = snapshot.standing_teams();
    let standing_ids: Vec<Uuid> = standing.iter().copied().collect();

    let projects = Project::list_visible(&mut *conn, snapshot.user_id, &standing_ids).await?;
    let ids: Vec<Uuid> = projects.iter().map(|p| p.id).collect();
    let mut entries = Project::team_entries(&mut *conn, &ids).await?;

    let expanded = projects
        .into_iter()
        .map(|p| {
            let teams = entries.remove(&p.id).unwrap_or_default();
            p.with_teams(teams)
        })
        .collect();

    Ok(ProjectListing::partition(snapshot.user_id, &standing, expanded))
}
