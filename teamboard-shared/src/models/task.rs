/// Task model and database operations
///
/// A task belongs to exactly one project and one team, and the team must be
/// attached to the project. The composite foreign key on
/// `(project_id, team_id)` enforces that at the storage layer too.
///
/// # Status
///
/// ```text
/// open ⇄ completed
/// ```
///
/// `completed_date` is set exactly when the status is `completed`; the table
/// carries a CHECK constraint for it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('open', 'completed');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     start_date DATE NOT NULL DEFAULT CURRENT_DATE,
///     due_date DATE NOT NULL,
///     status task_status NOT NULL DEFAULT 'open',
///     completed_date TIMESTAMPTZ,
///     project_id UUID NOT NULL,
///     team_id UUID NOT NULL,
///     assigned_to_user TEXT,
///     created_by UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     FOREIGN KEY (project_id, team_id)
///         REFERENCES project_teams (project_id, team_id) ON DELETE CASCADE,
///     CHECK ((status = 'completed') = (completed_date IS NOT NULL))
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use teamboard_shared::models::task::{Task, TaskStatus};
/// use teamboard_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(task_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// if let Some(task) = Task::find_by_id(&pool, task_id).await? {
///     let (status, completed_date) = task.status.toggled().with_completion(None, chrono::Utc::now());
///     Task::set_status(&pool, task.id, status, completed_date).await?;
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::auth::authorization::TaskRef;
use crate::error::{DomainError, DomainResult};
use crate::models::task_comment::CommentWithAttachments;
use crate::models::team::TeamSummary;

const TASK_COLUMNS: &str = "id, title, description, start_date, due_date, status, completed_date, \
                            project_id, team_id, assigned_to_user, created_by, created_at, updated_at";

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::Completed => "completed",
        }
    }

    /// The other status
    pub fn toggled(self) -> TaskStatus {
        match self {
            TaskStatus::Open => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::Open,
        }
    }

    /// Pairs the status with the completion date it requires
    ///
    /// `completed` keeps `requested` or falls back to `now`; `open` always
    /// clears the date.
    pub fn with_completion(
        self,
        requested: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> (TaskStatus, Option<DateTime<Utc>>) {
        match self {
            TaskStatus::Completed => (self, Some(requested.unwrap_or(now))),
            TaskStatus::Open => (self, None),
        }
    }
}

/// Task entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: TaskStatus,

    /// Set iff `status` is `completed`
    pub completed_date: Option<DateTime<Utc>>,

    pub project_id: Uuid,
    pub team_id: Uuid,

    /// Assignee email
    pub assigned_to_user: Option<String>,

    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub project_id: Uuid,
    pub team_id: Uuid,
    pub assigned_to_user: Option<String>,
    pub created_by: Uuid,
}

/// Project id and name attached to listed tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectSummary {
    pub id: Uuid,
    pub name: String,
}

/// Task as returned by listings
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: Task,
    pub project: Option<ProjectSummary>,
    pub team: Option<TeamSummary>,
    #[serde(rename = "taskComments")]
    pub comments: Vec<CommentWithAttachments>,
}

/// Checks task dates against today and returns the effective start date
///
/// The start date defaults to today. The due date may not be in the past or
/// before the start date.
pub fn validate_schedule(
    start_date: Option<NaiveDate>,
    due_date: NaiveDate,
    today: NaiveDate,
) -> DomainResult<NaiveDate> {
    if due_date < today {
        return Err(DomainError::validation("due_date", "Due date cannot be in the past"));
    }

    let start = start_date.unwrap_or(today);
    if start > due_date {
        return Err(DomainError::validation(
            "start_date",
            "Start date must be on or before the due date",
        ));
    }

    Ok(start)
}

impl Task {
    /// Descriptor consumed by the authorization gate
    pub fn gate_ref<'a>(&self, project_team_ids: &'a [Uuid]) -> TaskRef<'a> {
        TaskRef {
            team_id: self.team_id,
            created_by: Some(self.created_by),
            project_team_ids,
        }
    }

    pub async fn create<'e, E>(executor: E, data: CreateTask) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            INSERT INTO tasks (title, description, start_date, due_date, project_id, team_id,
                               assigned_to_user, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TASK_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(data.title.trim())
            .bind(data.description.trim())
            .bind(data.start_date)
            .bind(data.due_date)
            .bind(data.project_id)
            .bind(data.team_id)
            .bind(data.assigned_to_user)
            .bind(data.created_by)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");

        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Writes a status together with its completion date
    pub async fn set_status<'e, E>(
        executor: E,
        id: Uuid,
        status: TaskStatus,
        completed_date: Option<DateTime<Utc>>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            UPDATE tasks
            SET status = $2,
                completed_date = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(status)
            .bind(completed_date)
            .fetch_optional(executor)
            .await
    }

    /// Sets or clears the assignee
    pub async fn set_assignee<'e, E>(
        executor: E,
        id: Uuid,
        assignee: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            UPDATE tasks
            SET assigned_to_user = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(assignee)
            .fetch_optional(executor)
            .await
    }

    /// Deletes a task; comments and attachment rows cascade
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of tasks on any of `team_ids`
    pub async fn count_for_teams<'e, E>(executor: E, team_ids: &[Uuid]) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE team_id = ANY($1)")
            .bind(team_ids)
            .fetch_one(executor)
            .await
    }

    /// One page of tasks on any of `team_ids`, in listing order
    pub async fn page_for_teams<'e, E>(
        executor: E,
        team_ids: &[Uuid],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            r#"
            SELECT {TASK_COLUMNS} FROM tasks
            WHERE team_id = ANY($1)
            ORDER BY due_date ASC, created_at DESC, id ASC
            LIMIT $2 OFFSET $3
            "#
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(team_ids)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    /// Id and name of each given project
    pub async fn project_summaries<'e, E>(
        executor: E,
        project_ids: &[Uuid],
    ) -> Result<Vec<ProjectSummary>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProjectSummary>("SELECT id, name FROM projects WHERE id = ANY($1)")
            .bind(project_ids)
            .fetch_all(executor)
            .await
    }
}
