/// Authorization gate
///
/// Every team, project and task workflow asks [`can_access`] (or
/// [`authorize`]) before it reads or mutates anything. The decision is a pure
/// function of a [`MembershipSnapshot`] loaded for the current request and a
/// small descriptor of the resource; nothing is cached between requests, so
/// an invitation accepted a moment ago is honored on the very next call.
///
/// # Policy
///
/// "Standing" on a team means owning it or holding an `accepted` row.
///
/// | Resource | Action | Allowed when |
/// |---|---|---|
/// | Team | view | owner, or any ledger row for the caller's email |
/// | Team | create | always |
/// | Team | invite, delete | owner |
/// | Project | view | project creator, or standing on an attached team |
/// | Project | create | at least one team, standing on every listed team |
/// | Task | view, update, comment | standing on the task's team |
/// | Task | create | as view, and the team is attached to the project |
/// | Task | delete | task creator, or owner of the task's team |
///
/// Any other combination is denied.
///
/// # Masking
///
/// [`authorize`] reports a denial as [`AuthzError::Hidden`] when the caller
/// cannot even view the resource, so callers can answer "not found" instead
/// of confirming the id exists.
///
/// # Example
///
/// ```no_run
/// use teamboard_shared::auth::authorization::{authorize, Action, MembershipSnapshot, Resource};
/// use teamboard_shared::models::team::Team;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid, team_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let mut conn = pool.acquire().await?;
/// let snapshot = MembershipSnapshot::load(&mut conn, user_id, "user@example.com").await?;
///
/// if let Some(team) = Team::find_by_id(&mut *conn, team_id).await? {
///     authorize(&snapshot, &Resource::Team(team.gate_ref()), Action::Invite)?;
/// }
/// # Ok(())
/// # }
/// ```

use std::collections::{HashMap, HashSet};

use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::team::Team;
use crate::models::team_member::{InvitationStatus, TeamMember};
use crate::models::user::normalize_email;

/// Error type for gate denials
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Caller cannot view the resource at all
    #[error("{0} not found")]
    Hidden(&'static str),

    /// Caller can view the resource but not perform the action
    #[error("Not authorized to perform this action")]
    NotAuthorized,
}

/// Operation being attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
    Invite,
    Comment,
}

/// Team as seen by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamRef {
    pub id: Uuid,
    pub owner_id: Uuid,
}

/// Project as seen by the gate
///
/// `created_by` is `None` for a project that does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectRef<'a> {
    pub created_by: Option<Uuid>,
    pub team_ids: &'a [Uuid],
}

/// Task as seen by the gate
///
/// `project_team_ids` are the teams attached to the task's project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRef<'a> {
    pub team_id: Uuid,
    pub created_by: Option<Uuid>,
    pub project_team_ids: &'a [Uuid],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource<'a> {
    Team(TeamRef),
    Project(ProjectRef<'a>),
    Task(TaskRef<'a>),
}

impl Resource<'_> {
    /// Name used in "not found" messages
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Team(_) => "Team",
            Resource::Project(_) => "Project",
            Resource::Task(_) => "Task",
        }
    }
}

/// The caller's relation to every team, as of the start of a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSnapshot {
    pub user_id: Uuid,

    /// Normalized email
    pub email: String,

    owned_teams: HashSet<Uuid>,

    /// Strongest status per team when the email has several rows
    statuses: HashMap<Uuid, InvitationStatus>,
}

impl MembershipSnapshot {
    pub fn new(user_id: Uuid, email: &str) -> Self {
        Self {
            user_id,
            email: normalize_email(email),
            owned_teams: HashSet::new(),
            statuses: HashMap::new(),
        }
    }

    /// Builds a snapshot from owned team ids and `(team, status)` ledger rows
    pub fn from_parts(
        user_id: Uuid,
        email: &str,
        owned: impl IntoIterator<Item = Uuid>,
        rows: impl IntoIterator<Item = (Uuid, InvitationStatus)>,
    ) -> Self {
        let mut snapshot = Self::new(user_id, email);
        snapshot.owned_teams.extend(owned);
        for (team_id, status) in rows {
            snapshot.record(team_id, status);
        }
        snapshot
    }

    /// Reads the caller's ownerships and ledger rows
    pub async fn load(
        conn: &mut PgConnection,
        user_id: Uuid,
        email: &str,
    ) -> Result<Self, sqlx::Error> {
        let owned = Team::owned_ids(&mut *conn, user_id).await?;
        let rows = TeamMember::statuses_for_email(&mut *conn, email).await?;
        Ok(Self::from_parts(user_id, email, owned, rows))
    }

    pub fn with_owned(mut self, team_id: Uuid) -> Self {
        self.owned_teams.insert(team_id);
        self
    }

    pub fn with_status(mut self, team_id: Uuid, status: InvitationStatus) -> Self {
        self.record(team_id, status);
        self
    }

    fn record(&mut self, team_id: Uuid, status: InvitationStatus) {
        self.statuses
            .entry(team_id)
            .and_modify(|current| *current = current.strongest(status))
            .or_insert(status);
    }

    pub fn owns(&self, team_id: Uuid) -> bool {
        self.owned_teams.contains(&team_id)
    }

    pub fn status(&self, team_id: Uuid) -> Option<InvitationStatus> {
        self.statuses.get(&team_id).copied()
    }

    /// Owner or accepted member
    pub fn has_standing(&self, team_id: Uuid) -> bool {
        self.owns(team_id) || self.status(team_id) == Some(InvitationStatus::Accepted)
    }

    /// Teams the caller owns or has accepted
    pub fn standing_teams(&self) -> HashSet<Uuid> {
        self.statuses
            .iter()
            .filter(|(_, status)| **status == InvitationStatus::Accepted)
            .map(|(id, _)| *id)
            .chain(self.owned_teams.iter().copied())
            .collect()
    }
}

/// Decides whether the snapshot's user may perform `action` on `resource`
pub fn can_access(snapshot: &MembershipSnapshot, resource: &Resource<'_>, action: Action) -> bool {
    match (resource, action) {
        (Resource::Team(_), Action::Create) => true,
        (Resource::Team(team), Action::View) => {
            team.owner_id == snapshot.user_id || snapshot.status(team.id).is_some()
        }
        (Resource::Team(team), Action::Invite | Action::Delete) => {
            team.owner_id == snapshot.user_id
        }

        (Resource::Project(project), Action::View) => {
            project.created_by == Some(snapshot.user_id)
                || project.team_ids.iter().any(|id| snapshot.has_standing(*id))
        }
        (Resource::Project(project), Action::Create) => {
            !project.team_ids.is_empty()
                && project.team_ids.iter().all(|id| snapshot.has_standing(*id))
        }

        (Resource::Task(task), Action::View | Action::Update | Action::Comment) => {
            snapshot.has_standing(task.team_id)
        }
        (Resource::Task(task), Action::Create) => {
            snapshot.has_standing(task.team_id) && task.project_team_ids.contains(&task.team_id)
        }
        (Resource::Task(task), Action::Delete) => {
            task.created_by == Some(snapshot.user_id) || snapshot.owns(task.team_id)
        }

        _ => false,
    }
}

/// Like [`can_access`], but explains a denial
///
/// # Errors
///
/// - [`AuthzError::Hidden`] if the caller cannot view an existing resource
/// - [`AuthzError::NotAuthorized`] otherwise
pub fn authorize(
    snapshot: &MembershipSnapshot,
    resource: &Resource<'_>,
    action: Action,
) -> Result<(), AuthzError> {
    if can_access(snapshot, resource, action) {
        return Ok(());
    }

    if action != Action::Create && !can_access(snapshot, resource, Action::View) {
        return Err(AuthzError::Hidden(resource.kind()));
    }

    Err(AuthzError::NotAuthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct World {
        owner: Uuid,
        team: TeamRef,
    }

    fn world() -> World {
        let owner = Uuid::new_v4();
        World {
            owner,
            team: TeamRef {
                id: Uuid::new_v4(),
                owner_id: owner,
            },
        }
    }

    fn outsider() -> MembershipSnapshot {
        MembershipSnapshot::new(Uuid::new_v4(), "outsider@example.com")
    }

    #[test]
    fn test_team_view_any_status() {
        let w = world();
        let team = Resource::Team(w.team);

        let owner = MembershipSnapshot::new(w.owner, "o@example.com").with_owned(w.team.id);
        assert!(can_access(&owner, &team, Action::View));

        for status in [
            InvitationStatus::Invited,
            InvitationStatus::Accepted,
            InvitationStatus::Rejected,
        ] {
            let member = outsider().with_status(w.team.id, status);
            assert!(can_access(&member, &team, Action::View));
            assert!(!can_access(&member, &team, Action::Invite));
            assert!(!can_access(&member, &team, Action::Delete));
        }

        assert!(!can_access(&outsider(), &team, Action::View));
    }

    #[test]
    fn test_team_owner_only_actions() {
        let w = world();
        let team = Resource::Team(w.team);
        let owner = MembershipSnapshot::new(w.owner, "o@example.com").with_owned(w.team.id);

        assert!(can_access(&owner, &team, Action::Invite));
        assert!(can_access(&owner, &team, Action::Delete));
        assert!(can_access(&outsider(), &team, Action::Create));
        assert!(!can_access(&owner, &team, Action::Comment));
        assert!(!can_access(&owner, &team, Action::Update));
    }

    #[test]
    fn test_project_view() {
        let w = world();
        let teams = [w.team.id];
        let project = Resource::Project(ProjectRef {
            created_by: Some(w.owner),
            team_ids: &teams,
        });

        let creator = MembershipSnapshot::new(w.owner, "o@example.com");
        assert!(can_access(&creator, &project, Action::View));

        let accepted = outsider().with_status(w.team.id, InvitationStatus::Accepted);
        assert!(can_access(&accepted, &project, Action::View));

        let invited = outsider().with_status(w.team.id, InvitationStatus::Invited);
        assert!(!can_access(&invited, &project, Action::View));

        assert!(!can_access(&outsider(), &project, Action::View));
    }

    #[test]
    fn test_project_create_needs_every_team() {
        let w = world();
        let other_team = Uuid::new_v4();
        let user = MembershipSnapshot::new(w.owner, "o@example.com").with_owned(w.team.id);

        let one = [w.team.id];
        let both = [w.team.id, other_team];
        let none: [Uuid; 0] = [];

        let create = |team_ids: &[Uuid]| {
            can_access(
                &user,
                &Resource::Project(ProjectRef {
                    created_by: None,
                    team_ids,
                }),
                Action::Create,
            )
        };

        assert!(create(&one));
        assert!(!create(&both));
        assert!(!create(&none));

        let user = user.with_status(other_team, InvitationStatus::Accepted);
        assert!(can_access(
            &user,
            &Resource::Project(ProjectRef {
                created_by: None,
                team_ids: &both
            }),
            Action::Create
        ));
    }

    #[test]
    fn test_task_actions() {
        let w = world();
        let project_teams = [w.team.id];
        let creator = Uuid::new_v4();
        let task = Resource::Task(TaskRef {
            team_id: w.team.id,
            created_by: Some(creator),
            project_team_ids: &project_teams,
        });

        let accepted = outsider().with_status(w.team.id, InvitationStatus::Accepted);
        for action in [Action::View, Action::Update, Action::Comment, Action::Create] {
            assert!(can_access(&accepted, &task, action));
        }
        assert!(!can_access(&accepted, &task, Action::Delete));

        let invited = outsider().with_status(w.team.id, InvitationStatus::Invited);
        assert!(!can_access(&invited, &task, Action::View));

        let task_creator = MembershipSnapshot::new(creator, "c@example.com");
        assert!(can_access(&task_creator, &task, Action::Delete));

        let owner = MembershipSnapshot::new(w.owner, "o@example.com").with_owned(w.team.id);
        assert!(can_access(&owner, &task, Action::Delete));
        assert!(can_access(&owner, &task, Action::Update));
    }

    #[test]
    fn test_task_create_requires_team_in_project() {
        let w = world();
        let elsewhere = [Uuid::new_v4()];
        let task = Resource::Task(TaskRef {
            team_id: w.team.id,
            created_by: None,
            project_team_ids: &elsewhere,
        });

        let owner = MembershipSnapshot::new(w.owner, "o@example.com").with_owned(w.team.id);
        assert!(!can_access(&owner, &task, Action::Create));
    }

    #[test]
    fn test_authorize_masks_invisible_resources() {
        let w = world();
        let team = Resource::Team(w.team);

        assert_eq!(
            authorize(&outsider(), &team, Action::Delete),
            Err(AuthzError::Hidden("Team"))
        );

        let invited = outsider().with_status(w.team.id, InvitationStatus::Invited);
        assert_eq!(
            authorize(&invited, &team, Action::Delete),
            Err(AuthzError::NotAuthorized)
        );

        let none: [Uuid; 0] = [];
        let project = Resource::Project(ProjectRef {
            created_by: None,
            team_ids: &none,
        });
        assert_eq!(
            authorize(&outsider(), &project, Action::Create),
            Err(AuthzError::NotAuthorized)
        );
    }

    #[test]
    fn test_snapshot_keeps_strongest_status() {
        let team_id = Uuid::new_v4();
        let snapshot = MembershipSnapshot::from_parts(
            Uuid::new_v4(),
            "Someone@Example.com",
            [],
            [
                (team_id, InvitationStatus::Rejected),
                (team_id, InvitationStatus::Accepted),
                (team_id, InvitationStatus::Invited),
            ],
        );

        assert_eq!(snapshot.email, "someone@example.com");
        assert_eq!(snapshot.status(team_id), Some(InvitationStatus::Accepted));
        assert!(snapshot.has_standing(team_id));
        assert_eq!(snapshot.standing_teams(), HashSet::from([team_id]));
    }

    #[test]
    fn test_owned_team_is_standing_regardless_of_row() {
        let owned = Uuid::new_v4();
        let snapshot = MembershipSnapshot::new(Uuid::new_v4(), "a@example.com")
            .with_owned(owned)
            .with_status(owned, InvitationStatus::Rejected);
        assert!(snapshot.owns(owned));
        assert!(snapshot.standing_teams().contains(&owned));
    }
}
