/// Comment endpoint
///
/// `POST /tasks/:id/comments` takes `multipart/form-data` with one `comment`
/// part holding JSON (`{"commentText": "..."}`) and any number of `file`
/// (or `file[]`) parts. Files are stored before the comment row is written; if the write
/// fails they are removed again.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::MutationResponse,
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use teamboard_shared::{
    auth::middleware::AuthContext,
    models::task_comment::CommentWithAttachments,
    services::tasks::{self, NewAttachment},
};
use uuid::Uuid;

/// Name used for file parts sent without a file name
const UNNAMED_FILE: &str = "attachment";

#[derive(Debug, Default, Deserialize)]
pub struct CommentPayload {
    #[serde(default, alias = "commentText", alias = "comment")]
    pub comment_text: String,
}

/// Multipart field names accepted for attachments
pub fn is_file_part(name: &str) -> bool {
    matches!(name, "file" | "file[]")
}

impl CommentPayload {
    pub fn parse(raw: &str) -> ApiResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("`comment` must be JSON: {}", e)))
    }
}

pub async fn add_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(task_id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<MutationResponse<CommentWithAttachments>>)> {
    let mut payload: Option<CommentPayload> = None;
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("comment") => {
                let raw = field.text().await?;
                payload = Some(CommentPayload::parse(&raw)?);
            }
            Some(part) if is_file_part(part) => {
                let file_name = field.file_name().unwrap_or(UNNAMED_FILE).to_string();
                let bytes = field.bytes().await?;
                files.push(NewAttachment { file_name, bytes });
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    let payload = payload.ok_or_else(|| ApiError::BadRequest("Missing `comment` part".to_string()))?;

    let comment = tasks::add_comment(
        &state.db,
        state.store.as_ref(),
        &auth,
        task_id,
        &payload.comment_text,
        files,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(MutationResponse::new("Comment added", comment))))
}
