use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TaskTileError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Task tile not found")]
    NotFound,
    #[error("Task already has a tile in progress")]
    ActiveTileExists,
}

/// Stored uppercase (matching the tiling workflow's callbacks), serialized
/// lowercase in status frames.
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "lowercase")]
pub enum TileStatus {
    Draft,
    Started,
    Completed,
    Failed,
}

impl TileStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TileStatus::Completed | TileStatus::Failed)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TaskTile {
    pub task_tile_id: Uuid,
    pub task_id: Uuid,
    pub status: TileStatus,
    pub uri: Option<String>,
    pub content_type: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTaskTileStatus {
    pub status: TileStatus,
    pub uri: Option<String>,
    pub content_type: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

const TILE_COLUMNS: &str = "task_tile_id, task_id, status, uri, content_type, started_at, \
     completed_at, failed_at, error_code, error_message, created_at";

impl TaskTile {
    /// Creates a DRAFT tile. The partial unique index rejects a second
    /// non-terminal tile for the same task.
    pub async fn create(
        executor: impl sqlx::SqliteExecutor<'_>,
        task_id: Uuid,
        task_tile_id: Uuid,
    ) -> Result<Self, TaskTileError> {
        sqlx::query_as::<_, TaskTile>(&format!(
            "INSERT INTO task_tile (task_tile_id, task_id, status) VALUES ($1, $2, $3) \
             RETURNING {TILE_COLUMNS}"
        ))
        .bind(task_tile_id)
        .bind(task_id)
        .bind(TileStatus::Draft)
        .fetch_one(executor)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => TaskTileError::ActiveTileExists,
            _ => TaskTileError::Database(e),
        })
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskTile>(&format!(
            "SELECT {TILE_COLUMNS} FROM task_tile WHERE task_tile_id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_latest_by_task_id(
        pool: &SqlitePool,
        task_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskTile>(&format!(
            "SELECT {TILE_COLUMNS} FROM task_tile WHERE task_id = $1 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(task_id)
        .fetch_optional(pool)
        .await
    }

    /// Applies a status callback in one statement, stamping the timestamp
    /// column matching the new status.
    pub async fn update_status(
        executor: impl sqlx::SqliteExecutor<'_>,
        task_tile_id: Uuid,
        updates: &UpdateTaskTileStatus,
    ) -> Result<Self, TaskTileError> {
        sqlx::query_as::<_, TaskTile>(&format!(
            "UPDATE task_tile SET \
               status = $2, \
               uri = COALESCE($3, uri), \
               content_type = COALESCE($4, content_type), \
               error_code = COALESCE($5, error_code), \
               error_message = COALESCE($6, error_message), \
               started_at = CASE WHEN $2 = 'STARTED' THEN datetime('now', 'subsec') ELSE started_at END, \
               completed_at = CASE WHEN $2 = 'COMPLETED' THEN datetime('now', 'subsec') ELSE completed_at END, \
               failed_at = CASE WHEN $2 = 'FAILED' THEN datetime('now', 'subsec') ELSE failed_at END \
             WHERE task_tile_id = $1 \
             RETURNING {TILE_COLUMNS}"
        ))
        .bind(task_tile_id)
        .bind(updates.status)
        .bind(&updates.uri)
        .bind(&updates.content_type)
        .bind(&updates.error_code)
        .bind(&updates.error_message)
        .fetch_optional(executor)
        .await?
        .ok_or(TaskTileError::NotFound)
    }
}
