use db::DBService;
use db::models::{
    task::{Task, TaskStatus},
    task_tile::{TaskTile, TileStatus},
};
use serde::Serialize;
use thiserror::Error;
use utils::pmtiles::to_pmtiles_url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Task {0} not found")]
    TaskNotFound(Uuid),
}

/// Compact status projection sent over the status channel. Serialized form
/// is the change-detection fingerprint, so field order is stable.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskStatusSnapshot {
    pub task_id: Uuid,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_uri: Option<String>,
    pub tile: Option<TileStatusSnapshot>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TileStatusSnapshot {
    pub status: TileStatus,
    pub uri: Option<String>,
}

impl TaskStatusSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Reads the latest committed task and tile status. No caching; every call
/// reflects the current row state.
#[derive(Clone)]
pub struct StatusSnapshotService {
    db: DBService,
    s3_host_url: Option<String>,
}

impl StatusSnapshotService {
    pub fn new(db: DBService, s3_host_url: Option<String>) -> Self {
        Self { db, s3_host_url }
    }

    pub async fn get_snapshot(&self, task_id: Uuid) -> Result<TaskStatusSnapshot, SnapshotError> {
        let task = Task::find_by_id(&self.db.pool, task_id)
            .await?
            .ok_or(SnapshotError::TaskNotFound(task_id))?;

        let tile = TaskTile::find_latest_by_task_id(&self.db.pool, task_id)
            .await?
            .map(|tile| TileStatusSnapshot {
                status: tile.status,
                uri: to_pmtiles_url(tile.uri.as_deref(), self.s3_host_url.as_deref()),
            });

        Ok(TaskStatusSnapshot {
            task_id: task.task_id,
            status: task.status,
            output_uri: task.output_uri,
            tile,
        })
    }
}
