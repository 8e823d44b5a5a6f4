/// Task registry workflows
///
/// Creation checks, in order: the project is visible, the team is attached
/// to it, the caller has standing on the team, and the assignee (if any) is
/// the team owner or an accepted member.
///
/// Comment attachments are written to the store before the comment
/// transaction opens. If anything after that fails, the stored blobs are
/// discarded, so either the comment and all its files exist or none do.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::authorization::{authorize, Action, MembershipSnapshot, Resource, TaskRef};
use crate::auth::middleware::AuthContext;
use crate::error::{is_foreign_key_violation, DomainError, DomainResult};
use crate::models::project::{Project, ProjectWithTeams};
use crate::models::task::{validate_schedule, CreateTask, Task, TaskDetails, TaskStatus};
use crate::models::task_comment::{assemble_comments, CommentAttachment, CommentWithAttachments, TaskComment};
use crate::models::team::{Team, TeamSummary};
use crate::models::team_member::{InvitationStatus, TeamMember};
use crate::models::user::{normalize_email, User};
use crate::pagination::{Page, PageRequest};
use crate::services::projects::visible_projects;
use crate::services::{required, retry_read};
use crate::storage::{attachment_key, discard, AttachmentStore, StoredObject};

/// Input for a new task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub project_id: Uuid,
    pub team_id: Uuid,

    /// Assignee email; blank means unassigned
    pub assigned_to: Option<String>,
}

/// Partial task edit; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub completed_date: Option<DateTime<Utc>>,

    /// A blank string clears the assignee
    pub assigned_to: Option<String>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.completed_date.is_none() && self.assigned_to.is_none()
    }
}

/// An uploaded file waiting to be attached to a comment
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub file_name: String,
    pub bytes: Bytes,
}

/// One page of tasks plus the projects a new task could go into
#[derive(Debug, Clone, Serialize)]
pub struct TaskListing {
    pub tasks: Page<TaskDetails>,
    pub projects: Vec<ProjectWithTeams>,
}

/// Task together with the team ids of its project
struct LoadedTask {
    task: Task,
    project_team_ids: Vec<Uuid>,
}

async fn load_task(conn: &mut PgConnection, task_id: Uuid) -> DomainResult<LoadedTask> {
    let task = Task::find_by_id(&mut *conn, task_id)
        .await?
        .ok_or(DomainError::NotFound("Task"))?;
    let project_team_ids = Project::team_ids(&mut *conn, task.project_id).await?;

    Ok(LoadedTask {
        task,
        project_team_ids,
    })
}

impl LoadedTask {
    fn resource(&self) -> Resource<'_> {
        Resource::Task(self.task.gate_ref(&self.project_team_ids))
    }
}

/// Normalizes an assignee and checks it belongs to the team
///
/// Returns `None` for a blank assignee.
async fn resolve_assignee(
    conn: &mut PgConnection,
    team: &Team,
    assignee: Option<&str>,
) -> DomainResult<Option<String>> {
    let email = match assignee.map(normalize_email) {
        Some(email) if !email.is_empty() => email,
        _ => return Ok(None),
    };

    let owner = User::find_by_id(&mut *conn, team.created_by).await?;
    if owner.is_some_and(|o| normalize_email(&o.email) == email) {
        return Ok(Some(email));
    }

    let rows = TeamMember::list_for_pair(&mut *conn, team.id, &email).await?;
    if rows
        .iter()
        .any(|r| r.invitation_status == InvitationStatus::Accepted)
    {
        return Ok(Some(email));
    }

    Err(DomainError::InvalidAssociation(format!(
        "{email} is not a member of this team"
    )))
}

/// Creates a task on a (project, team) pair
pub async fn create_task(pool: &PgPool, auth: &AuthContext, input: NewTask) -> DomainResult<Task> {
    let title = required("title", &input.title)?;
    let due_date = input
        .due_date
        .ok_or_else(|| DomainError::validation("due_date", "Due date is required"))?;
    let start_date = validate_schedule(input.start_date, due_date, Utc::now().date_naive())?;

    let mut tx = pool.begin().await?;

    let project = Project::find_by_id(&mut *tx, input.project_id)
        .await?
        .ok_or(DomainError::NotFound("Project"))?;
    let project_team_ids = Project::team_ids(&mut *tx, project.id).await?;

    let snapshot = MembershipSnapshot::load(&mut tx, auth.user_id, &auth.email).await?;
    authorize(
        &snapshot,
        &Resource::Project(project.gate_ref(&project_team_ids)),
        Action::View,
    )?;

    if !project_team_ids.contains(&input.team_id) {
        return Err(DomainError::InvalidAssociation(
            "Team is not attached to this project".to_string(),
        ));
    }

    authorize(
        &snapshot,
        &Resource::Task(TaskRef {
            team_id: input.team_id,
            created_by: None,
            project_team_ids: &project_team_ids,
        }),
        Action::Create,
    )?;

    let team = Team::find_by_id(&mut *tx, input.team_id)
        .await?
        .ok_or(DomainError::NotFound("Team"))?;
    let assigned_to_user = resolve_assignee(&mut tx, &team, input.assigned_to.as_deref()).await?;

    let task = Task::create(
        &mut *tx,
        CreateTask {
            title,
            description: input.description,
            start_date,
            due_date,
            project_id: project.id,
            team_id: team.id,
            assigned_to_user,
            created_by: auth.user_id,
        },
    )
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            DomainError::InvalidAssociation("Team is not attached to this project".to_string())
        } else {
            DomainError::Database(e)
        }
    })?;

    tx.commit().await?;

    info!(
        task_id = %task.id,
        project_id = %task.project_id,
        team_id = %task.team_id,
        created_by = %auth.user_id,
        "Task created"
    );

    Ok(task)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Tasks on every team the caller has standing on, in listing order
pub async fn list_tasks(pool: &PgPool, auth: &AuthContext, page: PageRequest) -> DomainResult<TaskListing> {
    retry_read("list_tasks", || list_tasks_once(pool, auth, page)).await
}

async fn list_tasks_once(pool: &PgPool, auth: &AuthContext, page: PageRequest) -> DomainResult<TaskListing> {
    let mut conn = pool.acquire().await?;
    let snapshot = MembershipSnapshot::load(&mut conn, auth.user_id, &auth.email).await?;
    let team_ids: Vec<Uuid> = snapshot.standing_teams().into_iter().collect();

    let total = Task::count_for_teams(&mut *conn, &team_ids).await?;
    let tasks = Task::page_for_teams(
        &mut *conn,
        &team_ids,
        i64::from(page.limit),
        to_i64(page.offset()),
    )
    .await?;

    let task_ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
    let project_ids: Vec<Uuid> = unique(tasks.iter().map(|t| t.project_id));
    let task_team_ids: Vec<Uuid> = unique(tasks.iter().map(|t| t.team_id));

    let projects: HashMap<Uuid, _> = Task::project_summaries(&mut *conn, &project_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let teams: HashMap<Uuid, TeamSummary> = Team::find_many(&mut *conn, &task_team_ids)
        .await?
        .into_iter()
        .map(|t| (t.id, TeamSummary { id: t.id, name: t.name }))
        .collect();

    let comments = TaskComment::list_for_tasks(&mut *conn, &task_ids).await?;
    let comment_ids: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
    let attachments = CommentAttachment::list_for_comments(&mut *conn, &comment_ids).await?;
    let mut comments_by_task = assemble_comments(comments, attachments);

    let items = tasks
        .into_iter()
        .map(|task| TaskDetails {
            project: projects.get(&task.project_id).cloned(),
            team: teams.get(&task.team_id).cloned(),
            comments: comments_by_task.remove(&task.id).unwrap_or_default(),
            task,
        })
        .collect();

    let listing = visible_projects(&mut conn, &snapshot).await?;
    let projects = listing.owned.into_iter().chain(listing.collaborating).collect();

    debug!(user_id = %auth.user_id, total, page = page.page, "Listed tasks");

    Ok(TaskListing {
        tasks: Page::new(items, page, u64::try_from(total).unwrap_or(0)),
        projects,
    })
}

fn unique(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

/// Applies a partial edit to a task
pub async fn update_task(
    pool: &PgPool,
    auth: &AuthContext,
    task_id: Uuid,
    update: TaskUpdate,
) -> DomainResult<Task> {
    let mut tx = pool.begin().await?;

    let loaded = load_task(&mut tx, task_id).await?;
    let snapshot = MembershipSnapshot::load(&mut tx, auth.user_id, &auth.email).await?;
    authorize(&snapshot, &loaded.resource(), Action::Update)?;

    let mut task = loaded.task;
    let now = Utc::now();

    let target = match (update.status, update.completed_date) {
        (Some(status), requested) => Some(status.with_completion(requested, now)),
        (None, Some(date)) if task.status == TaskStatus::Completed => Some((TaskStatus::Completed, Some(date))),
        (None, Some(_)) => {
            return Err(DomainError::validation(
                "completed_date",
                "Only completed tasks have a completion date",
            ))
        }
        (None, None) => None,
    };

    if let Some((status, completed_date)) = target {
        task = Task::set_status(&mut *tx, task_id, status, completed_date)
            .await?
            .ok_or(DomainError::NotFound("Task"))?;
    }

    if let Some(assignee) = update.assigned_to.as_deref() {
        let team = Team::find_by_id(&mut *tx, task.team_id)
            .await?
            .ok_or(DomainError::NotFound("Team"))?;
        let assignee = resolve_assignee(&mut tx, &team, Some(assignee)).await?;
        task = Task::set_assignee(&mut *tx, task_id, assignee.as_deref())
            .await?
            .ok_or(DomainError::NotFound("Task"))?;
    }

    tx.commit().await?;

    info!(task_id = %task_id, status = task.status.as_str(), updated_by = %auth.user_id, "Task updated");
    Ok(task)
}

/// Flips a task between open and completed
pub async fn toggle_task(pool: &PgPool, auth: &AuthContext, task_id: Uuid) -> DomainResult<Task> {
    let mut tx = pool.begin().await?;

    let loaded = load_task(&mut tx, task_id).await?;
    let snapshot = MembershipSnapshot::load(&mut tx, auth.user_id, &auth.email).await?;
    authorize(&snapshot, &loaded.resource(), Action::Update)?;

    let (status, completed_date) = loaded.task.status.toggled().with_completion(None, Utc::now());
    let task = Task::set_status(&mut *tx, task_id, status, completed_date)
        .await?
        .ok_or(DomainError::NotFound("Task"))?;

    tx.commit().await?;

    info!(task_id = %task_id, status = status.as_str(), "Task toggled");
    Ok(task)
}

/// Deletes a task, its comments and their stored files
pub async fn delete_task(
    pool: &PgPool,
    store: &dyn AttachmentStore,
    auth: &AuthContext,
    task_id: Uuid,
) -> DomainResult<()> {
    let mut tx = pool.begin().await?;

    let loaded = load_task(&mut tx, task_id).await?;
    let snapshot = MembershipSnapshot::load(&mut tx, auth.user_id, &auth.email).await?;
    authorize(&snapshot, &loaded.resource(), Action::Delete)?;

    let keys = CommentAttachment::keys_for_task(&mut *tx, task_id).await?;
    Task::delete(&mut *tx, task_id).await?;

    tx.commit().await?;

    // Rows are gone; orphaned blobs are harmless if removal fails.
    discard(store, &keys).await;

    info!(task_id = %task_id, deleted_by = %auth.user_id, files = keys.len(), "Task deleted");
    Ok(())
}

/// Appends a comment, with optional files, to a task
pub async fn add_comment(
    pool: &PgPool,
    store: &dyn AttachmentStore,
    auth: &AuthContext,
    task_id: Uuid,
    text: &str,
    files: Vec<NewAttachment>,
) -> DomainResult<CommentWithAttachments> {
    let text = text.trim();
    if text.is_empty() && files.is_empty() {
        return Err(DomainError::validation("comment_text", "Comment cannot be empty"));
    }

    {
        let mut conn = pool.acquire().await?;
        let loaded = load_task(&mut conn, task_id).await?;
        let snapshot = MembershipSnapshot::load(&mut conn, auth.user_id, &auth.email).await?;
        authorize(&snapshot, &loaded.resource(), Action::Comment)?;
    }

    let mut stored: Vec<StoredObject> = Vec::with_capacity(files.len());
    for file in files {
        let key = attachment_key(task_id, &file.file_name);
        match store.put(&key, &file.file_name, file.bytes).await {
            Ok(object) => stored.push(object),
            Err(e) => {
                discard(store, &keys_of(&stored)).await;
                return Err(e.into());
            }
        }
    }

    match persist_comment(pool, auth, task_id, text, &stored).await {
        Ok(comment) => {
            info!(
                task_id = %task_id,
                comment_id = %comment.comment.id,
                files = comment.attachments.len(),
                "Comment added"
            );
            Ok(comment)
        }
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "Comment not saved, removing uploaded files");
            discard(store, &keys_of(&stored)).await;
            Err(e)
        }
    }
}

fn keys_of(objects: &[StoredObject]) -> Vec<String> {
    objects.iter().map(|o| o.key.clone()).collect()
}

async fn persist_comment(
    pool: &PgPool,
    auth: &AuthContext,
    task_id: Uuid,
    text: &str,
    stored: &[StoredObject],
) -> DomainResult<CommentWithAttachments> {
    let mut tx = pool.begin().await?;

    let comment = TaskComment::create(&mut *tx, task_id, &auth.email, text)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                DomainError::NotFound("Task")
            } else {
                DomainError::Database(e)
            }
        })?;

    let mut attachments = Vec::with_capacity(stored.len());
    for object in stored {
        attachments.push(CommentAttachment::create(&mut *tx, comment.id, object).await?);
    }

    tx.commit().await?;

    Ok(CommentWithAttachments {
        comment,
        attachments,
    })
}
