/// Team membership ledger
///
/// One row per invitation of an email address to a team. The email, not a
/// user id, is the join key: an invitation may be sent before anyone looks up
/// the matching account, and rows are joined to users lazily at read time.
///
/// # State Machine
///
/// ```text
/// invited → accepted
/// invited → rejected
/// ```
///
/// `accepted` and `rejected` are terminal for a row. Re-inviting an email
/// whose latest row is `rejected` creates a new row; the rejected one is kept
/// for audit.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE invitation_status AS ENUM ('invited', 'accepted', 'rejected');
///
/// CREATE TABLE team_members (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
///     member_email TEXT NOT NULL,
///     invitation_status invitation_status NOT NULL DEFAULT 'invited',
///     invited_by UUID NOT NULL REFERENCES users(id),
///     invited_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     responded_at TIMESTAMPTZ
/// );
///
/// CREATE UNIQUE INDEX team_members_active_pair_key
///     ON team_members (team_id, member_email)
///     WHERE invitation_status IN ('invited', 'accepted');
/// ```
///
/// The partial unique index serializes concurrent invites for the same pair:
/// the losing insert fails with a unique violation that the ledger reports as
/// a duplicate invite.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::auth::authorization::TeamRef;
use crate::error::{DomainError, DomainResult};
use crate::models::user::{normalize_email, UserSummary};

const MEMBER_COLUMNS: &str =
    "id, team_id, member_email, invitation_status, invited_by, invited_at, responded_at";

/// Invitation status of a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    /// Waiting for the invitee to answer
    Invited,

    /// Invitee joined the team
    Accepted,

    /// Invitee declined
    Rejected,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Invited => "invited",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Rejected => "rejected",
        }
    }

    /// Active rows block a second invitation for the same pair
    pub fn is_active(&self) -> bool {
        matches!(self, InvitationStatus::Invited | InvitationStatus::Accepted)
    }

    /// Checks if transition to target state is valid
    pub fn can_transition_to(&self, target: InvitationStatus) -> bool {
        matches!(
            (self, target),
            (InvitationStatus::Invited, InvitationStatus::Accepted)
                | (InvitationStatus::Invited, InvitationStatus::Rejected)
        )
    }

    /// Applies an invitee's decision
    ///
    /// `decision` must be `accepted` or `rejected`; the current state must be
    /// `invited`.
    pub fn respond(self, decision: InvitationStatus) -> DomainResult<InvitationStatus> {
        if decision == InvitationStatus::Invited {
            return Err(DomainError::validation(
                "invitation_status",
                "Decision must be accepted or rejected",
            ));
        }

        if !self.can_transition_to(decision) {
            return Err(DomainError::InvalidTransition {
                from: self,
                to: decision,
            });
        }

        Ok(decision)
    }

    /// Rank used when a team has several rows for one email
    fn precedence(&self) -> u8 {
        match self {
            InvitationStatus::Accepted => 3,
            InvitationStatus::Invited => 2,
            InvitationStatus::Rejected => 1,
        }
    }

    /// Keeps the stronger of two statuses for the same team
    pub fn strongest(self, other: InvitationStatus) -> InvitationStatus {
        if other.precedence() > self.precedence() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub id: Uuid,
    pub team_id: Uuid,
    pub member_email: String,
    pub invitation_status: InvitationStatus,
    pub invited_by: Uuid,
    pub invited_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Validates an invitation against the team and its existing rows
///
/// Checks in order: the inviter owns the team, the invitee is not the
/// inviter, and no active row exists for the pair.
pub fn check_invite(
    team: &TeamRef,
    inviter_id: Uuid,
    inviter_email: &str,
    invitee_email: &str,
    existing: &[TeamMember],
) -> DomainResult<()> {
    if team.owner_id != inviter_id {
        return Err(DomainError::NotAuthorized);
    }

    let invitee = normalize_email(invitee_email);
    if invitee == normalize_email(inviter_email) {
        return Err(DomainError::SelfInvite);
    }

    let duplicate = existing.iter().any(|row| {
        row.team_id == team.id
            && normalize_email(&row.member_email) == invitee
            && row.invitation_status.is_active()
    });
    if duplicate {
        return Err(DomainError::DuplicateInvite { email: invitee });
    }

    Ok(())
}

/// A team's ledger split for display
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamRoster {
    /// Accepted rows
    pub members: Vec<TeamMember>,

    /// Rows still `invited`
    pub pending: Vec<TeamMember>,
}

impl TeamRoster {
    /// Partitions rows; rejected rows are dropped
    pub fn partition(rows: Vec<TeamMember>) -> Self {
        let mut roster = TeamRoster::default();
        for row in rows {
            match row.invitation_status {
                InvitationStatus::Accepted => roster.members.push(row),
                InvitationStatus::Invited => roster.pending.push(row),
                InvitationStatus::Rejected => {}
            }
        }
        roster
    }

    /// Users who could still be invited: everyone without an active row,
    /// excluding the owner
    pub fn not_invited(&self, users: &[UserSummary], owner_id: Uuid) -> Vec<UserSummary> {
        let active: HashSet<String> = self
            .members
            .iter()
            .chain(self.pending.iter())
            .map(|row| normalize_email(&row.member_email))
            .collect();

        users
            .iter()
            .filter(|u| u.id != owner_id && !active.contains(&normalize_email(&u.email)))
            .cloned()
            .collect()
    }
}

impl TeamMember {
    /// Inserts a new `invited` row
    ///
    /// # Errors
    ///
    /// A concurrent or existing active row for the pair surfaces as a unique
    /// violation on `team_members_active_pair_key`.
    pub async fn create_invite<'e, E>(
        executor: E,
        team_id: Uuid,
        member_email: &str,
        invited_by: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO team_members (team_id, member_email, invited_by) VALUES ($1, $2, $3) RETURNING {MEMBER_COLUMNS}"
        );

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(team_id)
            .bind(normalize_email(member_email))
            .bind(invited_by)
            .fetch_one(executor)
            .await
    }

    /// Loads a row and locks it until the surrounding transaction ends
    pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {MEMBER_COLUMNS} FROM team_members WHERE id = $1 FOR UPDATE");

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Moves an `invited` row to `status`
    ///
    /// Returns `None` if the row is no longer `invited`.
    pub async fn transition<'e, E>(
        executor: E,
        id: Uuid,
        status: InvitationStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            UPDATE team_members
            SET invitation_status = $2,
                responded_at = NOW()
            WHERE id = $1 AND invitation_status = 'invited'
            RETURNING {MEMBER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(executor)
            .await
    }

    /// All rows of a team, oldest first
    pub async fn list_for_team<'e, E>(executor: E, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE team_id = $1 ORDER BY invited_at ASC"
        );

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(team_id)
            .fetch_all(executor)
            .await
    }

    /// All rows of several teams, oldest first
    pub async fn list_for_teams<'e, E>(executor: E, team_ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE team_id = ANY($1) ORDER BY invited_at ASC"
        );

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(team_ids)
            .fetch_all(executor)
            .await
    }

    /// All rows addressed to an email, newest first
    pub async fn list_for_email<'e, E>(executor: E, email: &str) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE member_email = $1 ORDER BY invited_at DESC"
        );

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(normalize_email(email))
            .fetch_all(executor)
            .await
    }

    /// `(team_id, status)` of every row addressed to an email
    pub async fn statuses_for_email<'e, E>(
        executor: E,
        email: &str,
    ) -> Result<Vec<(Uuid, InvitationStatus)>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, (Uuid, InvitationStatus)>(
            "SELECT team_id, invitation_status FROM team_members WHERE member_email = $1",
        )
        .bind(normalize_email(email))
        .fetch_all(executor)
        .await
    }

    /// Rows for one (team, email) pair, newest first
    pub async fn list_for_pair<'e, E>(
        executor: E,
        team_id: Uuid,
        email: &str,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE team_id = $1 AND member_email = $2 ORDER BY invited_at DESC"
        );

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(team_id)
            .bind(normalize_email(email))
            .fetch_all(executor)
            .await
    }
}
