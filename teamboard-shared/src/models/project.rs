/// Project model, project/team associations and visibility partitioning
///
/// A project is attached to one or more teams through `project_teams`. Who
/// may see a project is derived from those teams at read time: the creator
/// always sees it, and so does anyone with standing (owner or accepted
/// member) on at least one attached team.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     created_by UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE project_teams (
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE RESTRICT,
///     PRIMARY KEY (project_id, team_id)
/// );
/// ```

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::auth::authorization::ProjectRef;
use crate::models::team::TeamSummary;

const PROJECT_COLUMNS: &str = "id, name, description, created_by, created_at, updated_at";

/// Project entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: String,
    pub created_by: Uuid,
}

/// Row of the project/team join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectTeam {
    pub project_id: Uuid,
    pub team_id: Uuid,
}

/// Join row expanded with the team's name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTeamEntry {
    pub project_id: Uuid,
    pub team_id: Uuid,
    pub team: TeamSummary,
}

#[derive(sqlx::FromRow)]
struct ProjectTeamNameRow {
    project_id: Uuid,
    team_id: Uuid,
    team_name: String,
}

/// Project together with its attached teams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectWithTeams {
    #[serde(flatten)]
    pub project: Project,
    pub project_teams: Vec<ProjectTeamEntry>,
}

impl ProjectWithTeams {
    pub fn team_ids(&self) -> Vec<Uuid> {
        self.project_teams.iter().map(|pt| pt.team_id).collect()
    }

    pub fn has_team(&self, team_id: Uuid) -> bool {
        self.project_teams.iter().any(|pt| pt.team_id == team_id)
    }
}

/// Projects as seen by one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectListing {
    /// Created by the viewer
    pub owned: Vec<ProjectWithTeams>,

    /// Visible through an attached team, not created by the viewer
    pub collaborating: Vec<ProjectWithTeams>,
}

impl ProjectListing {
    /// Splits `projects` for `viewer`
    ///
    /// `standing` holds the teams the viewer owns or has accepted. Projects
    /// matching neither rule are dropped.
    pub fn partition(
        viewer: Uuid,
        standing: &HashSet<Uuid>,
        projects: Vec<ProjectWithTeams>,
    ) -> Self {
        let mut listing = ProjectListing::default();
        for p in projects {
            if p.project.created_by == viewer {
                listing.owned.push(p);
            } else if p.project_teams.iter().any(|pt| standing.contains(&pt.team_id)) {
                listing.collaborating.push(p);
            }
        }
        listing
    }
}

/// Removes repeated team ids, keeping first-seen order
pub fn dedup_team_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

impl Project {
    pub async fn create<'e, E>(executor: E, data: CreateProject) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO projects (name, description, created_by) VALUES ($1, $2, $3) RETURNING {PROJECT_COLUMNS}"
        );

        sqlx::query_as::<_, Project>(&query)
            .bind(data.name.trim())
            .bind(data.description.trim())
            .bind(data.created_by)
            .fetch_one(executor)
            .await
    }

    /// Attaches teams to a project
    pub async fn attach_teams<'e, E>(
        executor: E,
        project_id: Uuid,
        team_ids: &[Uuid],
    ) -> Result<Vec<ProjectTeam>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProjectTeam>(
            r#"
            INSERT INTO project_teams (project_id, team_id)
            SELECT $1, team_id FROM UNNEST($2::uuid[]) AS t(team_id)
            RETURNING project_id, team_id
            "#,
        )
        .bind(project_id)
        .bind(team_ids)
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");

        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Ids of the teams attached to a project
    pub async fn team_ids<'e, E>(executor: E, project_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT team_id FROM project_teams WHERE project_id = $1")
            .bind(project_id)
            .fetch_all(executor)
            .await
    }

    /// Projects created by `user_id` or attached to any of `team_ids`,
    /// newest first
    pub async fn list_visible<'e, E>(
        executor: E,
        user_id: Uuid,
        team_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            SELECT {PROJECT_COLUMNS} FROM projects
            WHERE created_by = $1
               OR id IN (SELECT project_id FROM project_teams WHERE team_id = ANY($2))
            ORDER BY created_at DESC
            "#
        );

        sqlx::query_as::<_, Project>(&query)
            .bind(user_id)
            .bind(team_ids)
            .fetch_all(executor)
            .await
    }

    /// Loads the expanded team list of each project
    pub async fn team_entries<'e, E>(
        executor: E,
        project_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<ProjectTeamEntry>>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, ProjectTeamNameRow>(
            r#"
            SELECT pt.project_id, pt.team_id, t.name AS team_name
            FROM project_teams pt
            JOIN teams t ON t.id = pt.team_id
            WHERE pt.project_id = ANY($1)
            ORDER BY t.name ASC
            "#,
        )
        .bind(project_ids)
        .fetch_all(executor)
        .await?;

        let mut by_project: HashMap<Uuid, Vec<ProjectTeamEntry>> = HashMap::new();
        for row in rows {
            by_project.entry(row.project_id).or_default().push(ProjectTeamEntry {
                project_id: row.project_id,
                team_id: row.team_id,
                team: TeamSummary {
                    id: row.team_id,
                    name: row.team_name,
                },
            });
        }
        Ok(by_project)
    }

    pub fn with_teams(self, project_teams: Vec<ProjectTeamEntry>) -> ProjectWithTeams {
        ProjectWithTeams {
            project: self,
            project_teams,
        }
    }

    /// Descriptor consumed by the authorization gate
    pub fn gate_ref<'a>(&self, team_ids: &'a [Uuid]) -> ProjectRef<'a> {
        ProjectRef {
            created_by: Some(self.created_by),
            team_ids,
        }
    }
}
