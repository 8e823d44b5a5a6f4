/// Invitation workflow over the membership ledger
///
/// Inviting and responding both run in one transaction. Two owners
/// inviting the same email at once both pass the duplicate check, and the
/// partial unique index turns the second insert into a `DuplicateInvite`.
/// Two responses to one row are serialized with `SELECT ... FOR UPDATE`, so
/// the later one sees the terminal state and fails with `InvalidTransition`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::auth::authorization::{authorize, Action, MembershipSnapshot, Resource};
use crate::auth::middleware::AuthContext;
use crate::error::{is_unique_violation, DomainError, DomainResult, ACTIVE_INVITE_INDEX};
use crate::models::team::Team;
use crate::models::team_member::{check_invite, InvitationStatus, TeamMember, TeamRoster};
use crate::models::user::{normalize_email, User, UserSummary};
use crate::services::retry_read;

/// A team's ledger as shown to one viewer
#[derive(Debug, Clone, Serialize)]
pub struct RosterView {
    pub team: Team,
    pub members: Vec<TeamMember>,
    pub pending: Vec<TeamMember>,

    /// Users without an active row; only filled in for the owner
    pub not_invited: Vec<UserSummary>,
}

/// A team the caller has been invited to, with the caller's row
#[derive(Debug, Clone, Serialize)]
pub struct InvitedTeam {
    #[serde(flatten)]
    pub team: Team,
    pub member_id: Uuid,
    pub invitation_status: InvitationStatus,
    pub invited_at: DateTime<Utc>,
}

/// Someone a task on a team can be assigned to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignableMember {
    pub email: String,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub is_owner: bool,
}

/// Invites `email` to a team owned by the caller
pub async fn invite(
    pool: &PgPool,
    auth: &AuthContext,
    team_id: Uuid,
    email: &str,
) -> DomainResult<TeamMember> {
    let invitee = normalize_email(email);
    if invitee.is_empty() {
        return Err(DomainError::validation("member_email", "Email is required"));
    }
    if !invitee.validate_email() {
        return Err(DomainError::validation("member_email", "Email is not valid"));
    }

    let mut tx = pool.begin().await?;

    let team = Team::find_by_id(&mut *tx, team_id)
        .await?
        .ok_or(DomainError::NotFound("Team"))?;

    let snapshot = MembershipSnapshot::load(&mut tx, auth.user_id, &auth.email).await?;
    authorize(&snapshot, &Resource::Team(team.gate_ref()), Action::Invite)?;

    let existing = TeamMember::list_for_pair(&mut *tx, team_id, &invitee).await?;
    check_invite(&team.gate_ref(), auth.user_id, &auth.email, &invitee, &existing)?;

    let row = TeamMember::create_invite(&mut *tx, team_id, &invitee, auth.user_id)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, ACTIVE_INVITE_INDEX) {
                DomainError::DuplicateInvite {
                    email: invitee.clone(),
                }
            } else {
                DomainError::Database(e)
            }
        })?;

    tx.commit().await?;

    info!(
        team_id = %team_id,
        member_id = %row.id,
        invited_by = %auth.user_id,
        "Invitation created"
    );

    Ok(row)
}

/// Accepts or rejects an invitation addressed to the caller
pub async fn respond(
    pool: &PgPool,
    auth: &AuthContext,
    member_id: Uuid,
    decision: InvitationStatus,
) -> DomainResult<TeamMember> {
    let mut tx = pool.begin().await?;

    let row = TeamMember::lock_by_id(&mut tx, member_id)
        .await?
        .ok_or(DomainError::NotFound("Invitation"))?;

    if normalize_email(&row.member_email) != normalize_email(&auth.email) {
        return Err(DomainError::NotAuthorized);
    }

    let next = row.invitation_status.respond(decision)?;

    let updated = TeamMember::transition(&mut *tx, member_id, next)
        .await?
        .ok_or(DomainError::InvalidTransition {
            from: row.invitation_status,
            to: next,
        })?;

    tx.commit().await?;

    info!(
        team_id = %updated.team_id,
        member_id = %member_id,
        status = %updated.invitation_status,
        "Invitation answered"
    );

    Ok(updated)
}

/// A team's accepted members and pending invitations
pub async fn roster(pool: &PgPool, auth: &AuthContext, team_id: Uuid) -> DomainResult<RosterView> {
    retry_read("team_roster", || roster_once(pool, auth, team_id)).await
}

async fn roster_once(pool: &PgPool, auth: &AuthContext, team_id: Uuid) -> DomainResult<RosterView> {
    let mut conn = pool.acquire().await?;

    let team = Team::find_by_id(&mut *conn, team_id)
        .await?
        .ok_or(DomainError::NotFound("Team"))?;

    let snapshot = MembershipSnapshot::load(&mut conn, auth.user_id, &auth.email).await?;
    authorize(&snapshot, &Resource::Team(team.gate_ref()), Action::View)?;

    let roster = TeamRoster::partition(TeamMember::list_for_team(&mut *conn, team_id).await?);

    let not_invited = if team.is_owned_by(auth.user_id) {
        let users = User::list_summaries(&mut *conn).await?;
        roster.not_invited(&users, team.created_by)
    } else {
        Vec::new()
    };

    Ok(RosterView {
        team,
        members: roster.members,
        pending: roster.pending,
        not_invited,
    })
}

/// Teams the caller's email has been invited to, with the latest row per team
pub async fn invitations_for(pool: &PgPool, auth: &AuthContext) -> DomainResult<Vec<InvitedTeam>> {
    retry_read("invitations_for", || invitations_once(pool, auth)).await
}

async fn invitations_once(pool: &PgPool, auth: &AuthContext) -> DomainResult<Vec<InvitedTeam>> {
    let mut conn = pool.acquire().await?;

    let rows = TeamMember::list_for_email(&mut *conn, &auth.email).await?;
    let team_ids: Vec<Uuid> = rows.iter().map(|r| r.team_id).collect();
    let teams = Team::find_many(&mut *conn, &team_ids).await?;

    Ok(latest_per_team(rows, teams))
}

/// Pairs each team with the newest of the given rows for it
///
/// `rows` must be ordered newest first.
fn latest_per_team(rows: Vec<TeamMember>, teams: Vec<Team>) -> Vec<InvitedTeam> {
    let mut seen = std::collections::HashSet::new();
    let mut by_id: std::collections::HashMap<Uuid, Team> =
        teams.into_iter().map(|t| (t.id, t)).collect();

    rows.into_iter()
        .filter(|row| seen.insert(row.team_id))
        .filter_map(|row| {
            by_id.remove(&row.team_id).map(|team| InvitedTeam {
                team,
                member_id: row.id,
                invitation_status: row.invitation_status,
                invited_at: row.invited_at,
            })
        })
        .collect()
}

/// The owner and accepted members of a team, for picking an assignee
pub async fn assignable_members(
    pool: &PgPool,
    auth: &AuthContext,
    team_id: Uuid,
) -> DomainResult<Vec<AssignableMember>> {
    retry_read("assignable_members", || assignable_once(pool, auth, team_id)).await
}

async fn assignable_once(
    pool: &PgPool,
    auth: &AuthContext,
    team_id: Uuid,
) -> DomainResult<Vec<AssignableMember>> {
    let mut conn = pool.acquire().await?;

    let team = Team::find_by_id(&mut *conn, team_id)
        .await?
        .ok_or(DomainError::NotFound("Team"))?;

    let snapshot = MembershipSnapshot::load(&mut conn, auth.user_id, &auth.email).await?;
    authorize(&snapshot, &Resource::Team(team.gate_ref()), Action::View)?;
    if !snapshot.has_standing(team_id) {
        return Err(DomainError::NotAuthorized);
    }

    let owner = User::find_by_id(&mut *conn, team.created_by)
        .await?
        .ok_or(DomainError::NotFound("User"))?;

    let roster = TeamRoster::partition(TeamMember::list_for_team(&mut *conn, team_id).await?);
    let emails: Vec<String> = roster
        .members
        .iter()
        .map(|m| normalize_email(&m.member_email))
        .collect();
    let accounts = User::summaries_by_emails(&mut *conn, &emails).await?;

    debug!(team_id = %team_id, members = emails.len(), "Loaded assignable members");

    Ok(assignable_from(&owner.summary(), &emails, &accounts))
}

fn assignable_from(
    owner: &UserSummary,
    accepted_emails: &[String],
    accounts: &[UserSummary],
) -> Vec<AssignableMember> {
    let mut out = vec![AssignableMember {
        email: normalize_email(&owner.email),
        user_id: Some(owner.id),
        name: Some(owner.name.clone()),
        is_owner: true,
    }];

    for email in accepted_emails {
        if out.iter().any(|m| &m.email == email) {
            continue;
        }
        let account = accounts.iter().find(|u| &normalize_email(&u.email) == email);
        out.push(AssignableMember {
            email: email.clone(),
            user_id: account.map(|u| u.id),
            name: account.map(|u| u.name.clone()),
            is_owner: false,
        });
    }

    out
}
