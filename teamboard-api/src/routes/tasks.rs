/// Task endpoints
///
/// - `POST /tasks` - Create a task on a (project, team) pair
/// - `GET /tasks` - Paged tasks on the caller's teams
/// - `PATCH /tasks/:id` - Change status, completion date or assignee
/// - `POST /tasks/:id/toggle` - Flip open/completed
/// - `DELETE /tasks/:id` - Delete a task

use crate::{app::AppState, error::ApiResult, response::MutationResponse, routes::PaginationParams};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use teamboard_shared::{
    auth::middleware::AuthContext,
    models::{
        project::ProjectWithTeams,
        task::{Task, TaskDetails, TaskStatus},
    },
    pagination::PageRequest,
    services::tasks::{self, NewTask, TaskListing, TaskUpdate},
};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,

    #[serde(rename = "projectId")]
    pub project_id: Uuid,

    #[serde(rename = "teamId")]
    pub team_id: Uuid,

    #[serde(rename = "assignedTo", default)]
    pub assigned_to: Option<String>,
}

impl From<CreateTaskRequest> for NewTask {
    fn from(req: CreateTaskRequest) -> Self {
        NewTask {
            title: req.title,
            description: req.description,
            start_date: req.start_date,
            due_date: req.due_date,
            project_id: req.project_id,
            team_id: req.team_id,
            assigned_to: req.assigned_to,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub status: Option<TaskStatus>,
    pub completed_date: Option<DateTime<Utc>>,

    #[serde(alias = "assignedTo")]
    pub assigned_to: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksPagination {
    pub current_page: u32,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct TasksResponse {
    pub tasks: Vec<TaskDetails>,
    pub projects: Vec<ProjectWithTeams>,
    pub pagination: TasksPagination,
}

impl From<TaskListing> for TasksResponse {
    fn from(listing: TaskListing) -> Self {
        Self {
            pagination: TasksPagination {
                current_page: listing.tasks.current_page,
                total_pages: listing.tasks.total_pages,
            },
            tasks: listing.tasks.items,
            projects: listing.projects,
        }
    }
}

pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<MutationResponse<Task>>)> {
    let task = tasks::create_task(&state.db, &auth, req.into()).await?;
    Ok((StatusCode::CREATED, Json(MutationResponse::new("Task created", task))))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<TasksResponse>> {
    let listing = tasks::list_tasks(&state.db, &auth, PageRequest::from(params)).await?;
    Ok(Json(listing.into()))
}

pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<MutationResponse<Task>>> {
    let update = TaskUpdate {
        status: req.status,
        completed_date: req.completed_date,
        assigned_to: req.assigned_to,
    };

    let task = tasks::update_task(&state.db, &auth, id, update).await?;
    Ok(Json(MutationResponse::new("Task updated", task)))
}

pub async fn toggle_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MutationResponse<Task>>> {
    let task = tasks::toggle_task(&state.db, &auth, id).await?;
    let message = format!("Task marked {}", task.status.as_str());
    Ok(Json(MutationResponse::new(message, task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MutationResponse<()>>> {
    tasks::delete_task(&state.db, state.store.as_ref(), &auth, id).await?;
    Ok(Json(MutationResponse::done("Task deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_field_names() {
        let req: CreateTaskRequest = serde_json::from_value(serde_json::json!({
            "title": "Ship it",
            "due_date": "2030-01-31",
            "projectId": Uuid::nil(),
            "teamId": Uuid::nil(),
            "assignedTo": "b@example.com",
        }))
        .unwrap();

        let task: NewTask = req.into();
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2030, 1, 31));
        assert_eq!(task.assigned_to.as_deref(), Some("b@example.com"));
        assert!(task.description.is_empty());
        assert!(task.start_date.is_none());
    }

    #[test]
    fn test_update_request_accepts_both_assignee_spellings() {
        let a: UpdateTaskRequest = serde_json::from_str(r#"{"assigned_to": ""}"#).unwrap();
        let b: UpdateTaskRequest = serde_json::from_str(r#"{"assignedTo": "x@example.com"}"#).unwrap();
        assert_eq!(a.assigned_to.as_deref(), Some(""));
        assert_eq!(b.assigned_to.as_deref(), Some("x@example.com"));

        let c: UpdateTaskRequest = serde_json::from_str(r#"{"status": "completed"}"#).unwrap();
        assert_eq!(c.status, Some(TaskStatus::Completed));
    }
}
