use std::sync::Arc;

use db::DBService;
use db::models::{
    task::{Task, TaskError, UpdateTaskExecution},
    task_tile::{TaskTile, TaskTileError, TileStatus, UpdateTaskTileStatus},
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::engine::OptimizationEngine;

#[derive(Debug, Error)]
pub enum TaskTileServiceError {
    #[error(transparent)]
    Tile(#[from] TaskTileError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Task {0} not found")]
    TaskNotFound(Uuid),
    #[error("Tile status callbacks cannot set status back to draft")]
    DraftNotAllowed,
    #[error("Tile {0} already reached a terminal status")]
    AlreadyResolved(Uuid),
}

/// Manages tile artifact jobs: drafts a tile row, kicks off the tiling run
/// and applies the workflow's status callbacks.
#[derive(Clone)]
pub struct TaskTileService {
    db: DBService,
    engine: Arc<dyn OptimizationEngine>,
}

impl TaskTileService {
    pub fn new(db: DBService, engine: Arc<dyn OptimizationEngine>) -> Self {
        Self { db, engine }
    }

    /// Drafts a tile for the task and submits the tiling run. An engine
    /// failure is recorded on the tile as FAILED rather than surfaced, so
    /// the tile row always reflects the attempt.
    pub async fn create_tile(&self, task_id: Uuid) -> Result<TaskTile, TaskTileServiceError> {
        Task::find_by_id(&self.db.pool, task_id)
            .await?
            .ok_or(TaskTileServiceError::TaskNotFound(task_id))?;

        let tile = TaskTile::create(&self.db.pool, task_id, Uuid::new_v4()).await?;
        info!(task_id = %task_id, task_tile_id = %tile.task_tile_id, "drafted task tile");

        match self.engine.submit_tile_run(task_id, tile.task_tile_id).await {
            Ok(submission) => {
                info!(
                    task_tile_id = %tile.task_tile_id,
                    flow_run_id = %submission.flow_run_id,
                    "submitted tile run"
                );
                Ok(tile)
            }
            Err(e) => {
                warn!(task_tile_id = %tile.task_tile_id, error = %e, "tile run submission failed");
                let failed = TaskTile::update_status(
                    &self.db.pool,
                    tile.task_tile_id,
                    &UpdateTaskTileStatus {
                        status: TileStatus::Failed,
                        uri: None,
                        content_type: None,
                        error_code: Some("TILE_SUBMISSION_FAILED".into()),
                        error_message: Some(e.to_string()),
                    },
                )
                .await?;
                Ok(failed)
            }
        }
    }

    /// Applies a status callback from the tiling workflow. Callbacks for a
    /// tile that already resolved are rejected, so a late or replayed
    /// delivery cannot overwrite the recorded outcome. A COMPLETED callback
    /// also records the tileset location on the parent task.
    pub async fn update_tile_status(
        &self,
        task_tile_id: Uuid,
        updates: &UpdateTaskTileStatus,
    ) -> Result<TaskTile, TaskTileServiceError> {
        if updates.status == TileStatus::Draft {
            return Err(TaskTileServiceError::DraftNotAllowed);
        }

        let current = TaskTile::find_by_id(&self.db.pool, task_tile_id)
            .await?
            .ok_or(TaskTileError::NotFound)?;
        if current.status.is_terminal() {
            return Err(TaskTileServiceError::AlreadyResolved(task_tile_id));
        }

        let tile = TaskTile::update_status(&self.db.pool, task_tile_id, updates).await?;

        if tile.status == TileStatus::Completed {
            if let Some(uri) = &tile.uri {
                Task::update_execution(
                    &self.db.pool,
                    tile.task_id,
                    UpdateTaskExecution {
                        tileset_uri: Some(Some(uri.clone())),
                        ..Default::default()
                    },
                )
                .await?;
            }
        }

        Ok(tile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use db::models::task::{CreateTask, TaskStatus};
    use prefect_client::{EngineSubmission, PrefectClientError};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TileEngine {
        calls: AtomicUsize,
        fail: bool,
    }

    impl TileEngine {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl OptimizationEngine for TileEngine {
        async fn submit_optimization(
            &self,
            _task_id: Uuid,
            _parameters: Value,
        ) -> Result<EngineSubmission, PrefectClientError> {
            unreachable!("tile service never submits optimizations")
        }

        async fn submit_tile_run(
            &self,
            _task_id: Uuid,
            _task_tile_id: Uuid,
        ) -> Result<EngineSubmission, PrefectClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PrefectClientError::Submission("tile worker down".into()))
            } else {
                Ok(EngineSubmission {
                    deployment_id: "dep-tile".into(),
                    flow_run_id: "run-tile".into(),
                })
            }
        }
    }

    async fn service_with_task(engine: Arc<TileEngine>) -> (TaskTileService, DBService, Uuid) {
        let db = DBService::new_in_memory().await.unwrap();
        let task_id = Uuid::new_v4();
        Task::create(
            &db.pool,
            &CreateTask {
                name: "t".into(),
                description: None,
                status: TaskStatus::Completed,
                resolution: None,
                resampling: None,
                variant: None,
            },
            task_id,
        )
        .await
        .unwrap();
        (TaskTileService::new(db.clone(), engine), db, task_id)
    }

    #[tokio::test]
    async fn creates_draft_tile_and_submits_run() {
        let engine = TileEngine::ok();
        let (service, _db, task_id) = service_with_task(engine.clone()).await;

        let tile = service.create_tile(task_id).await.unwrap();
        assert_eq!(tile.status, TileStatus::Draft);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn engine_failure_marks_tile_failed() {
        let engine = TileEngine::failing();
        let (service, _db, task_id) = service_with_task(engine).await;

        let tile = service.create_tile(task_id).await.unwrap();
        assert_eq!(tile.status, TileStatus::Failed);
        assert_eq!(tile.error_code.as_deref(), Some("TILE_SUBMISSION_FAILED"));
        assert!(tile.failed_at.is_some());
    }

    #[tokio::test]
    async fn rejects_duplicate_active_tile() {
        let engine = TileEngine::ok();
        let (service, _db, task_id) = service_with_task(engine.clone()).await;

        service.create_tile(task_id).await.unwrap();
        let err = service.create_tile(task_id).await.unwrap_err();
        assert!(matches!(
            err,
            TaskTileServiceError::Tile(TaskTileError::ActiveTileExists)
        ));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn completed_callback_records_tileset_on_task() {
        let engine = TileEngine::ok();
        let (service, db, task_id) = service_with_task(engine).await;

        let tile = service.create_tile(task_id).await.unwrap();
        let updated = service
            .update_tile_status(
                tile.task_tile_id,
                &UpdateTaskTileStatus {
                    status: TileStatus::Completed,
                    uri: Some("s3://bucket/tiles/out.pmtiles".into()),
                    content_type: Some("application/vnd.pmtiles".into()),
                    error_code: None,
                    error_message: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, TileStatus::Completed);

        let task = Task::find_by_id(&db.pool, task_id).await.unwrap().unwrap();
        assert_eq!(task.tileset_uri.as_deref(), Some("s3://bucket/tiles/out.pmtiles"));
    }

    #[tokio::test]
    async fn draft_callback_is_rejected() {
        let engine = TileEngine::ok();
        let (service, _db, task_id) = service_with_task(engine).await;

        let tile = service.create_tile(task_id).await.unwrap();
        let err = service
            .update_tile_status(
                tile.task_tile_id,
                &UpdateTaskTileStatus {
                    status: TileStatus::Draft,
                    uri: None,
                    content_type: None,
                    error_code: None,
                    error_message: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TaskTileServiceError::DraftNotAllowed));
    }

    #[tokio::test]
    async fn callback_after_terminal_status_is_rejected() {
        let engine = TileEngine::ok();
        let (service, _db, task_id) = service_with_task(engine).await;

        let tile = service.create_tile(task_id).await.unwrap();
        service
            .update_tile_status(
                tile.task_tile_id,
                &UpdateTaskTileStatus {
                    status: TileStatus::Failed,
                    uri: None,
                    content_type: None,
                    error_code: Some("TILING_FAILED".into()),
                    error_message: Some("no features".into()),
                },
            )
            .await
            .unwrap();

        let err = service
            .update_tile_status(
                tile.task_tile_id,
                &UpdateTaskTileStatus {
                    status: TileStatus::Completed,
                    uri: Some("s3://bucket/tiles/late.pmtiles".into()),
                    content_type: None,
                    error_code: None,
                    error_message: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TaskTileServiceError::AlreadyResolved(_)));
    }

    #[tokio::test]
    async fn callback_for_unknown_tile_is_not_found() {
        let engine = TileEngine::ok();
        let (service, _db, _task_id) = service_with_task(engine).await;

        let err = service
            .update_tile_status(
                Uuid::new_v4(),
                &UpdateTaskTileStatus {
                    status: TileStatus::Completed,
                    uri: None,
                    content_type: None,
                    error_code: None,
                    error_message: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TaskTileServiceError::Tile(TaskTileError::NotFound)
        ));
    }

    #[tokio::test]
    async fn tile_for_unknown_task_is_not_found() {
        let engine = TileEngine::ok();
        let (service, _db, _task_id) = service_with_task(engine).await;

        let err = service.create_tile(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, TaskTileServiceError::TaskNotFound(_)));
    }
}
