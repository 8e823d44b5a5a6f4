/// Team model and database operations
///
/// A team is owned by the user who created it. Ownership is never stored as
/// a membership row: the owner is implicitly a member of their own team.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE teams (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     created_by UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::auth::authorization::TeamRef;

const TEAM_COLUMNS: &str = "id, name, description, created_by, created_at, updated_at";

/// Team entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub description: String,

    /// Owner of the team
    pub created_by: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeam {
    pub name: String,
    pub description: String,
    pub created_by: Uuid,
}

/// Team id and name, used when expanding project associations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
}

impl Team {
    /// Descriptor consumed by the authorization gate
    pub fn gate_ref(&self) -> TeamRef {
        TeamRef {
            id: self.id,
            owner_id: self.created_by,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.created_by == user_id
    }

    pub async fn create<'e, E>(executor: E, data: CreateTeam) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO teams (name, description, created_by) VALUES ($1, $2, $3) RETURNING {TEAM_COLUMNS}"
        );

        sqlx::query_as::<_, Team>(&query)
            .bind(data.name.trim())
            .bind(data.description.trim())
            .bind(data.created_by)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = $1");

        sqlx::query_as::<_, Team>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Loads several teams at once; missing ids are simply absent
    pub async fn find_many<'e, E>(executor: E, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ANY($1) ORDER BY name ASC");

        sqlx::query_as::<_, Team>(&query)
            .bind(ids)
            .fetch_all(executor)
            .await
    }

    /// Teams created by `user_id`, newest first
    pub async fn page_owned<'e, E>(
        executor: E,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE created_by = $1 ORDER BY created_at DESC, id ASC LIMIT $2 OFFSET $3"
        );

        sqlx::query_as::<_, Team>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count_owned<'e, E>(executor: E, user_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM teams WHERE created_by = $1")
            .bind(user_id)
            .fetch_one(executor)
            .await
    }

    /// Ids of teams created by `user_id`
    pub async fn owned_ids<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT id FROM teams WHERE created_by = $1")
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    /// Number of projects associated with the team
    pub async fn project_count<'e, E>(executor: E, id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT COUNT(*) FROM project_teams WHERE team_id = $1")
            .bind(id)
            .fetch_one(executor)
            .await
    }

    /// Deletes the team; membership rows cascade
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
