/// Team registry workflows
///
/// Deleting a team is refused while any project still references it; the
/// `ON DELETE RESTRICT` on `project_teams` backs the check up if a project is
/// attached concurrently. Ledger rows go with the team.

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::authorization::{authorize, Action, MembershipSnapshot, Resource};
use crate::auth::middleware::AuthContext;
use crate::error::{is_foreign_key_violation, DomainError, DomainResult};
use crate::models::team::{CreateTeam, Team};
use crate::models::team_member::TeamMember;
use crate::pagination::{Page, PageRequest};
use crate::services::membership::{invitations_for, InvitedTeam};
use crate::services::{required, retry_read};

/// Longest accepted team name
const MAX_TEAM_NAME: usize = 255;

/// Owned team with its whole ledger
#[derive(Debug, Clone, Serialize)]
pub struct TeamWithMembers {
    #[serde(flatten)]
    pub team: Team,
    pub team_members: Vec<TeamMember>,
}

/// Both team lists of the caller, paginated independently
#[derive(Debug, Clone, Serialize)]
pub struct TeamsOverview {
    pub owned: Page<TeamWithMembers>,
    pub invited: Page<InvitedTeam>,
}

pub async fn create_team(
    pool: &PgPool,
    auth: &AuthContext,
    name: &str,
    description: &str,
) -> DomainResult<Team> {
    let name = required("name", name)?;
    if name.chars().count() > MAX_TEAM_NAME {
        return Err(DomainError::validation("name", "Name is too long"));
    }

    let team = Team::create(
        pool,
        CreateTeam {
            name,
            description: description.to_string(),
            created_by: auth.user_id,
        },
    )
    .await?;

    info!(team_id = %team.id, owner = %auth.user_id, "Team created");
    Ok(team)
}

/// Teams the caller owns and teams the caller was invited to
pub async fn list_teams(
    pool: &PgPool,
    auth: &AuthContext,
    page: PageRequest,
) -> DomainResult<TeamsOverview> {
    let owned = retry_read("list_owned_teams", || owned_with_members(pool, auth, page)).await?;
    let invited = invitations_for(pool, auth).await?;

    Ok(TeamsOverview {
        owned,
        invited: Page::from_all(invited, page),
    })
}

/// One page of owned teams; ledger rows are loaded for that page only
async fn owned_with_members(
    pool: &PgPool,
    auth: &AuthContext,
    page: PageRequest,
) -> DomainResult<Page<TeamWithMembers>> {
    let mut conn = pool.acquire().await?;

    let total = Team::count_owned(&mut *conn, auth.user_id).await?;
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
    let teams = Team::page_owned(&mut *conn, auth.user_id, i64::from(page.limit), offset).await?;

    let ids: Vec<Uuid> = teams.iter().map(|t| t.id).collect();
    let rows = TeamMember::list_for_teams(&mut *conn, &ids).await?;

    let items = teams
        .into_iter()
        .map(|team| {
            let team_members = rows.iter().filter(|r| r.team_id == team.id).cloned().collect();
            TeamWithMembers { team, team_members }
        })
        .collect();

    Ok(Page::new(items, page, u64::try_from(total).unwrap_or(0)))
}

/// Deletes a team owned by the caller
pub async fn delete_team(pool: &PgPool, auth: &AuthContext, team_id: Uuid) -> DomainResult<()> {
    let mut tx = pool.begin().await?;

    let team = Team::find_by_id(&mut *tx, team_id)
        .await?
        .ok_or(DomainError::NotFound("Team"))?;

    let snapshot = MembershipSnapshot::load(&mut tx, auth.user_id, &auth.email).await?;
    authorize(&snapshot, &Resource::Team(team.gate_ref()), Action::Delete)?;

    let projects = Team::project_count(&mut *tx, team_id).await?;
    if projects > 0 {
        return Err(DomainError::InvalidAssociation(format!(
            "Team is still attached to {projects} project(s)"
        )));
    }

    Team::delete(&mut *tx, team_id).await.map_err(|e| {
        if is_foreign_key_violation(&e) {
            DomainError::InvalidAssociation("Team is still attached to a project".to_string())
        } else {
            DomainError::Database(e)
        }
    })?;

    tx.commit().await?;

    info!(team_id = %team_id, owner = %auth.user_id, "Team deleted");
    Ok(())
}
