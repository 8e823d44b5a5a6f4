/// Team, project and task workflows against a real database

mod common;

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::PgPool;
use teamboard_shared::error::DomainError;
use teamboard_shared::models::task::TaskStatus;
use teamboard_shared::models::team_member::InvitationStatus;
use teamboard_shared::pagination::PageRequest;
use teamboard_shared::services::membership::{invite, respond};
use teamboard_shared::services::projects::{create_project, list_projects};
use teamboard_shared::services::tasks::{
    add_comment, create_task, delete_task, list_tasks, toggle_task, update_task, NewAttachment, NewTask,
    TaskUpdate,
};
use teamboard_shared::services::teams::{delete_team, list_teams};
use teamboard_shared::storage::{AttachmentStore, LocalAttachmentStore, StorageError, StoredObject};
use uuid::Uuid;

use common::{in_days, project, signup, team};

fn new_task(project_id: Uuid, team_id: Uuid, due_in: i64) -> NewTask {
    NewTask {
        title: format!("Task due in {due_in}"),
        description: String::new(),
        start_date: None,
        due_date: Some(in_days(due_in)),
        project_id,
        team_id,
        assigned_to: None,
    }
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_project_visibility_follows_standing(pool: PgPool) {
    let owner = signup(&pool, "owner@example.com").await;
    let member = signup(&pool, "b@example.com").await;
    let pending = signup(&pool, "c@example.com").await;
    let t = team(&pool, &owner, "Platform").await;

    let row = invite(&pool, &owner, t.id, &member.email).await.unwrap();
    respond(&pool, &member, row.id, InvitationStatus::Accepted).await.unwrap();
    invite(&pool, &owner, t.id, &pending.email).await.unwrap();

    let p = project(&pool, &owner, &[t.id]).await;
    assert!(p.has_team(t.id));

    let mine = list_projects(&pool, &owner).await.unwrap();
    assert_eq!(mine.listing.owned.len(), 1);
    assert!(mine.listing.collaborating.is_empty());

    let theirs = list_projects(&pool, &member).await.unwrap();
    assert!(theirs.listing.owned.is_empty());
    assert_eq!(theirs.listing.collaborating[0].project.id, p.project.id);

    let nobody = list_projects(&pool, &pending).await.unwrap();
    assert_eq!(nobody.listing.iter().count(), 0);
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_project_needs_a_team(pool: PgPool) {
    let owner = signup(&pool, "owner@example.com").await;

    let err = create_project(&pool, &owner, "Launch", "", &[]).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidAssociation(_)));

    let err = create_project(&pool, &owner, "Launch", "", &[Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound("Team")));
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_task_team_must_belong_to_project(pool: PgPool) {
    let owner = signup(&pool, "owner@example.com").await;
    let t1 = team(&pool, &owner, "Platform").await;
    let t2 = team(&pool, &owner, "Design").await;
    let p = project(&pool, &owner, &[t1.id]).await;

    let err = create_task(&pool, &owner, new_task(p.project.id, t2.id, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidAssociation(_)));

    let task = create_task(&pool, &owner, new_task(p.project.id, t1.id, 3)).await.unwrap();
    assert_eq!(task.status, TaskStatus::Open);
    assert_eq!(task.start_date, in_days(0));
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_task_in_the_past_is_rejected(pool: PgPool) {
    let owner = signup(&pool, "owner@example.com").await;
    let t = team(&pool, &owner, "Platform").await;
    let p = project(&pool, &owner, &[t.id]).await;

    let err = create_task(&pool, &owner, new_task(p.project.id, t.id, -1))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation { field: "due_date", .. }));
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_assignee_must_be_on_the_team(pool: PgPool) {
    let owner = signup(&pool, "owner@example.com").await;
    let t = team(&pool, &owner, "Platform").await;
    let p = project(&pool, &owner, &[t.id]).await;
    invite(&pool, &owner, t.id, "pending@example.com").await.unwrap();

    let mut input = new_task(p.project.id, t.id, 2);
    input.assigned_to = Some("pending@example.com".to_string());
    let err = create_task(&pool, &owner, input).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidAssociation(_)));

    let mut input = new_task(p.project.id, t.id, 2);
    input.assigned_to = Some("Owner@Example.com".to_string());
    let task = create_task(&pool, &owner, input).await.unwrap();
    assert_eq!(task.assigned_to_user.as_deref(), Some("owner@example.com"));

    let cleared = update_task(
        &pool,
        &owner,
        task.id,
        TaskUpdate {
            assigned_to: Some(String::new()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(cleared.assigned_to_user.is_none());
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_thirteen_tasks_paginate_into_three_pages(pool: PgPool) {
    let owner = signup(&pool, "owner@example.com").await;
    let t = team(&pool, &owner, "Platform").await;
    let p = project(&pool, &owner, &[t.id]).await;

    for due_in in (0..13).rev() {
        create_task(&pool, &owner, new_task(p.project.id, t.id, due_in)).await.unwrap();
    }

    let first = list_tasks(&pool, &owner, PageRequest::new(Some(1), Some(6))).await.unwrap();
    assert_eq!(first.tasks.total_pages, 3);
    assert_eq!(first.tasks.total_count, 13);
    assert_eq!(first.tasks.items.len(), 6);
    assert_eq!(first.tasks.items[0].task.due_date, in_days(0));
    assert!(first
        .tasks
        .items
        .windows(2)
        .all(|w| w[0].task.due_date <= w[1].task.due_date));
    assert_eq!(first.projects.len(), 1);

    let last = list_tasks(&pool, &owner, PageRequest::new(Some(3), Some(6))).await.unwrap();
    assert_eq!(last.tasks.items.len(), 1);
    assert_eq!(last.tasks.items[0].task.due_date, in_days(12));
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_same_due_date_lists_newest_first(pool: PgPool) {
    let owner = signup(&pool, "owner@example.com").await;
    let t = team(&pool, &owner, "Platform").await;
    let p = project(&pool, &owner, &[t.id]).await;

    let later = create_task(&pool, &owner, new_task(p.project.id, t.id, 5)).await.unwrap();
    let older = create_task(&pool, &owner, new_task(p.project.id, t.id, 2)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let newer = create_task(&pool, &owner, new_task(p.project.id, t.id, 2)).await.unwrap();
    assert!(newer.created_at > older.created_at);

    let listing = list_tasks(&pool, &owner, PageRequest::new(None, None)).await.unwrap();
    let ids: Vec<Uuid> = listing.tasks.items.iter().map(|d| d.task.id).collect();
    assert_eq!(ids, vec![newer.id, older.id, later.id]);
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_pending_invitee_sees_no_tasks(pool: PgPool) {
    let owner = signup(&pool, "owner@example.com").await;
    let pending = signup(&pool, "c@example.com").await;
    let t = team(&pool, &owner, "Platform").await;
    let p = project(&pool, &owner, &[t.id]).await;
    invite(&pool, &owner, t.id, &pending.email).await.unwrap();

    let task = create_task(&pool, &owner, new_task(p.project.id, t.id, 1)).await.unwrap();

    let listing = list_tasks(&pool, &pending, PageRequest::new(None, None)).await.unwrap();
    assert_eq!(listing.tasks.total_count, 0);

    let err = toggle_task(&pool, &pending, task.id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound("Task")));
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_toggle_sets_and_clears_completion(pool: PgPool) {
    let owner = signup(&pool, "owner@example.com").await;
    let t = team(&pool, &owner, "Platform").await;
    let p = project(&pool, &owner, &[t.id]).await;
    let task = create_task(&pool, &owner, new_task(p.project.id, t.id, 1)).await.unwrap();

    let done = toggle_task(&pool, &owner, task.id).await.unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.completed_date.is_some());

    let reopened = toggle_task(&pool, &owner, task.id).await.unwrap();
    assert_eq!(reopened.status, TaskStatus::Open);
    assert!(reopened.completed_date.is_none());
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_team_with_project_cannot_be_deleted(pool: PgPool) {
    let owner = signup(&pool, "owner@example.com").await;
    let t = team(&pool, &owner, "Platform").await;
    let spare = team(&pool, &owner, "Spare").await;
    project(&pool, &owner, &[t.id]).await;

    let err = delete_team(&pool, &owner, t.id).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidAssociation(_)));

    delete_team(&pool, &owner, spare.id).await.unwrap();
    let overview = list_teams(&pool, &owner, PageRequest::new(None, None)).await.unwrap();
    assert_eq!(overview.owned.total_count, 1);
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_comment_files_are_removed_with_the_task(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalAttachmentStore::new(dir.path(), "/uploads");

    let owner = signup(&pool, "owner@example.com").await;
    let t = team(&pool, &owner, "Platform").await;
    let p = project(&pool, &owner, &[t.id]).await;
    let task = create_task(&pool, &owner, new_task(p.project.id, t.id, 1)).await.unwrap();

    let comment = add_comment(
        &pool,
        &store,
        &owner,
        task.id,
        "Spec attached",
        vec![NewAttachment {
            file_name: "notes.txt".to_string(),
            bytes: Bytes::from_static(b"hello"),
        }],
    )
    .await
    .unwrap();

    assert_eq!(comment.attachments.len(), 1);
    let key = comment.attachments[0].storage_key.clone();
    assert!(dir.path().join(&key).exists());

    let listing = list_tasks(&pool, &owner, PageRequest::new(None, None)).await.unwrap();
    assert_eq!(listing.tasks.items[0].comments.len(), 1);

    delete_task(&pool, &store, &owner, task.id).await.unwrap();
    assert!(!dir.path().join(&key).exists());
}

/// Writes to disk, but deletes the task first so the comment insert fails
struct TaskVanishingStore {
    inner: LocalAttachmentStore,
    pool: PgPool,
    task_id: Uuid,
}

#[async_trait]
impl AttachmentStore for TaskVanishingStore {
    async fn put(&self, key: &str, file_name: &str, bytes: Bytes) -> Result<StoredObject, StorageError> {
        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(self.task_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;

        self.inner.put(key, file_name, bytes).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }
}

fn files_under(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| {
                    let path = entry.path();
                    if path.is_dir() {
                        files_under(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_failed_comment_removes_stored_files(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();

    let owner = signup(&pool, "owner@example.com").await;
    let t = team(&pool, &owner, "Platform").await;
    let p = project(&pool, &owner, &[t.id]).await;
    let task = create_task(&pool, &owner, new_task(p.project.id, t.id, 1)).await.unwrap();

    let store = TaskVanishingStore {
        inner: LocalAttachmentStore::new(dir.path(), "/uploads"),
        pool: pool.clone(),
        task_id: task.id,
    };

    let files = ["a.txt", "b.txt"]
        .into_iter()
        .map(|name| NewAttachment {
            file_name: name.to_string(),
            bytes: Bytes::from_static(b"data"),
        })
        .collect();

    let err = add_comment(&pool, &store, &owner, task.id, "Lost", files)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound("Task")));

    assert_eq!(files_under(dir.path()), 0);
    let (comments,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task_comments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(comments, 0);
}

#[sqlx::test(migrator = "teamboard_shared::db::migrations::MIGRATOR")]
#[ignore]
async fn test_owned_teams_are_paged_with_their_ledgers(pool: PgPool) {
    let owner = signup(&pool, "owner@example.com").await;
    let first = team(&pool, &owner, "First").await;
    invite(&pool, &owner, first.id, "b@example.com").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    team(&pool, &owner, "Second").await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    team(&pool, &owner, "Third").await;

    let page_one = list_teams(&pool, &owner, PageRequest::new(Some(1), Some(2))).await.unwrap();
    assert_eq!(page_one.owned.total_count, 3);
    assert_eq!(page_one.owned.total_pages, 2);
    let names: Vec<&str> = page_one.owned.items.iter().map(|t| t.team.name.as_str()).collect();
    assert_eq!(names, vec!["Third", "Second"]);
    assert!(page_one.owned.items.iter().all(|t| t.team_members.is_empty()));

    let page_two = list_teams(&pool, &owner, PageRequest::new(Some(2), Some(2))).await.unwrap();
    assert_eq!(page_two.owned.items.len(), 1);
    assert_eq!(page_two.owned.items[0].team.id, first.id);
    assert_eq!(page_two.owned.items[0].team_members.len(), 1);
    assert_eq!(page_two.owned.items[0].team_members[0].member_email, "b@example.com");
}
