/// Task comments and their attachment metadata
///
/// Comments are append-only. Attachments reference blobs written through an
/// [`AttachmentStore`](crate::storage::AttachmentStore); only the URL, the
/// original file name and the storage key are kept here.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE task_comments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     commenter_email TEXT NOT NULL,
///     comment_text TEXT NOT NULL,
///     comment_date TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE comment_attachments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     comment_id UUID NOT NULL REFERENCES task_comments(id) ON DELETE CASCADE,
///     file_url TEXT NOT NULL,
///     file_name TEXT NOT NULL,
///     storage_key TEXT NOT NULL
/// );
/// ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::storage::StoredObject;

const COMMENT_COLUMNS: &str = "id, task_id, commenter_email, comment_text, comment_date";
const ATTACHMENT_COLUMNS: &str = "id, comment_id, file_url, file_name, storage_key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskComment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub commenter_email: String,
    pub comment_text: String,
    pub comment_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentAttachment {
    pub id: Uuid,
    pub comment_id: Uuid,
    pub file_url: String,
    pub file_name: String,

    /// Key in the attachment store, not exposed to clients
    #[serde(skip_serializing, default)]
    pub storage_key: String,
}

/// Comment with its attachments, as embedded in task listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentWithAttachments {
    #[serde(flatten)]
    pub comment: TaskComment,
    pub attachments: Vec<CommentAttachment>,
}

/// Groups comments by task, attaching each comment's files
///
/// Comments keep the order they were given in.
pub fn assemble_comments(
    comments: Vec<TaskComment>,
    attachments: Vec<CommentAttachment>,
) -> HashMap<Uuid, Vec<CommentWithAttachments>> {
    let mut files: HashMap<Uuid, Vec<CommentAttachment>> = HashMap::new();
    for attachment in attachments {
        files.entry(attachment.comment_id).or_default().push(attachment);
    }

    let mut by_task: HashMap<Uuid, Vec<CommentWithAttachments>> = HashMap::new();
    for comment in comments {
        let attachments = files.remove(&comment.id).unwrap_or_default();
        by_task
            .entry(comment.task_id)
            .or_default()
            .push(CommentWithAttachments { comment, attachments });
    }
    by_task
}

impl TaskComment {
    pub async fn create<'e, E>(
        executor: E,
        task_id: Uuid,
        commenter_email: &str,
        comment_text: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO task_comments (task_id, commenter_email, comment_text) VALUES ($1, $2, $3) RETURNING {COMMENT_COLUMNS}"
        );

        sqlx::query_as::<_, TaskComment>(&query)
            .bind(task_id)
            .bind(commenter_email)
            .bind(comment_text.trim())
            .fetch_one(executor)
            .await
    }

    /// Comments on any of `task_ids`, oldest first
    pub async fn list_for_tasks<'e, E>(executor: E, task_ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM task_comments WHERE task_id = ANY($1) ORDER BY comment_date ASC, id ASC"
        );

        sqlx::query_as::<_, TaskComment>(&query)
            .bind(task_ids)
            .fetch_all(executor)
            .await
    }
}

impl CommentAttachment {
    pub async fn create<'e, E>(
        executor: E,
        comment_id: Uuid,
        object: &StoredObject,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO comment_attachments (comment_id, file_url, file_name, storage_key) VALUES ($1, $2, $3, $4) RETURNING {ATTACHMENT_COLUMNS}"
        );

        sqlx::query_as::<_, CommentAttachment>(&query)
            .bind(comment_id)
            .bind(&object.url)
            .bind(&object.file_name)
            .bind(&object.key)
            .fetch_one(executor)
            .await
    }

    pub async fn list_for_comments<'e, E>(
        executor: E,
        comment_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM comment_attachments WHERE comment_id = ANY($1) ORDER BY file_name ASC"
        );

        sqlx::query_as::<_, CommentAttachment>(&query)
            .bind(comment_ids)
            .fetch_all(executor)
            .await
    }

    /// Storage keys of every attachment under a task's comments
    pub async fn keys_for_task<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<String>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"
            SELECT a.storage_key
            FROM comment_attachments a
            JOIN task_comments c ON c.id = a.comment_id
            WHERE c.task_id = $1
            "#,
        )
        .bind(task_id)
        .fetch_all(executor)
        .await
    }
}
