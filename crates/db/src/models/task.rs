use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use thiserror::Error;
use uuid::Uuid;

use super::{
    geometry::TaskGeometryWithGeometry,
    task_layer::{TaskLayer, TaskLayerWithConstraints},
    task_layer_constraint::TaskLayerConstraint,
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Task not found")]
    NotFound,
    #[error("No task execution metadata provided to update")]
    NoExecutionFields,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Draft,
    Pending,
    Submitted,
    Running,
    Completed,
    Failed,
    FailedToSubmit,
}

impl TaskStatus {
    /// Terminal states end the polling channel for the task.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::FailedToSubmit
        )
    }

    /// States with an engine run possibly still in flight.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TaskStatus::Submitted | TaskStatus::Running)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Draft => write!(f, "draft"),
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Submitted => write!(f, "submitted"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::FailedToSubmit => write!(f, "failed_to_submit"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub resolution: Option<i64>,
    pub resampling: Option<String>,
    pub variant: Option<String>,
    pub tileset_uri: Option<String>,
    pub output_uri: Option<String>,
    pub status: TaskStatus,
    pub status_message: Option<String>,
    pub prefect_flow_run_id: Option<String>,
    pub prefect_deployment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task hydrated with its owned layers, constraints and geometries.
#[derive(Debug, Clone, Serialize)]
pub struct TaskWithLayers {
    #[serde(flatten)]
    pub task: Task,
    pub layers: Vec<TaskLayerWithConstraints>,
    pub geometries: Vec<TaskGeometryWithGeometry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTask {
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub resolution: Option<i64>,
    pub resampling: Option<String>,
    pub variant: Option<String>,
}

/// Execution metadata update. The outer `Option` means "leave untouched", the
/// inner one is the stored value, so fields can be set to NULL explicitly.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskExecution {
    pub status: Option<TaskStatus>,
    pub status_message: Option<Option<String>>,
    pub prefect_flow_run_id: Option<Option<String>>,
    pub prefect_deployment_id: Option<Option<String>>,
    pub tileset_uri: Option<Option<String>>,
    pub output_uri: Option<Option<String>>,
}

const TASK_COLUMNS: &str = "task_id, name, description, resolution, resampling, variant, \
     tileset_uri, output_uri, status, status_message, prefect_flow_run_id, \
     prefect_deployment_id, created_at, updated_at";

impl Task {
    pub async fn create(
        executor: impl sqlx::SqliteExecutor<'_>,
        data: &CreateTask,
        task_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO task (task_id, name, description, status, resolution, resampling, variant) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(task_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.status)
        .bind(data.resolution)
        .bind(&data.resampling)
        .bind(&data.variant)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM task WHERE task_id = $1 AND record_end_date IS NULL"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM task WHERE record_end_date IS NULL ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_with_children(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<TaskWithLayers>, sqlx::Error> {
        let Some(task) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let layers = TaskLayer::find_by_task_id(pool, id).await?;
        let mut hydrated = Vec::with_capacity(layers.len());
        for layer in layers {
            let constraints =
                TaskLayerConstraint::find_by_layer_id(pool, layer.task_layer_id).await?;
            hydrated.push(TaskLayerWithConstraints { layer, constraints });
        }

        let geometries =
            super::geometry::TaskGeometry::find_with_geometry_by_task_id(pool, id).await?;

        Ok(Some(TaskWithLayers {
            task,
            layers: hydrated,
            geometries,
        }))
    }

    /// Updates status and execution metadata in a single statement so the
    /// status and the engine identifiers can never disagree about whether a
    /// submission is in flight.
    pub async fn update_execution(
        executor: impl sqlx::SqliteExecutor<'_>,
        task_id: Uuid,
        updates: UpdateTaskExecution,
    ) -> Result<Self, TaskError> {
        let has_updates = updates.status.is_some()
            || updates.status_message.is_some()
            || updates.prefect_flow_run_id.is_some()
            || updates.prefect_deployment_id.is_some()
            || updates.tileset_uri.is_some()
            || updates.output_uri.is_some();
        if !has_updates {
            return Err(TaskError::NoExecutionFields);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE task SET ");
        {
            let mut fields = qb.separated(", ");
            if let Some(status) = updates.status {
                fields.push("status = ");
                fields.push_bind_unseparated(status);
            }
            if let Some(message) = updates.status_message {
                fields.push("status_message = ");
                fields.push_bind_unseparated(message);
            }
            if let Some(flow_run_id) = updates.prefect_flow_run_id {
                fields.push("prefect_flow_run_id = ");
                fields.push_bind_unseparated(flow_run_id);
            }
            if let Some(deployment_id) = updates.prefect_deployment_id {
                fields.push("prefect_deployment_id = ");
                fields.push_bind_unseparated(deployment_id);
            }
            if let Some(tileset_uri) = updates.tileset_uri {
                fields.push("tileset_uri = ");
                fields.push_bind_unseparated(tileset_uri);
            }
            if let Some(output_uri) = updates.output_uri {
                fields.push("output_uri = ");
                fields.push_bind_unseparated(output_uri);
            }
        }
        qb.push(", updated_at = datetime('now', 'subsec') WHERE task_id = ");
        qb.push_bind(task_id);
        qb.push(" AND record_end_date IS NULL RETURNING ");
        qb.push(TASK_COLUMNS);

        qb.build_query_as::<Task>()
            .fetch_optional(executor)
            .await?
            .ok_or(TaskError::NotFound)
    }

    /// Soft delete; the row stays referenceable but disappears from reads.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE task SET record_end_date = datetime('now', 'subsec') \
             WHERE task_id = $1 AND record_end_date IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    fn pending_task(name: &str) -> CreateTask {
        CreateTask {
            name: name.to_string(),
            description: None,
            status: TaskStatus::Pending,
            resolution: None,
            resampling: None,
            variant: None,
        }
    }

    #[tokio::test]
    async fn create_and_find_round_trip() {
        let db = DBService::new_in_memory().await.unwrap();
        let id = Uuid::new_v4();
        let created = Task::create(&db.pool, &pending_task("coastal"), id)
            .await
            .unwrap();
        assert_eq!(created.status, TaskStatus::Pending);
        assert!(created.prefect_flow_run_id.is_none());

        let found = Task::find_by_id(&db.pool, id).await.unwrap().unwrap();
        assert_eq!(found.name, "coastal");
    }

    #[tokio::test]
    async fn update_execution_writes_status_and_ids_together() {
        let db = DBService::new_in_memory().await.unwrap();
        let id = Uuid::new_v4();
        Task::create(&db.pool, &pending_task("t"), id).await.unwrap();

        let updated = Task::update_execution(
            &db.pool,
            id,
            UpdateTaskExecution {
                status: Some(TaskStatus::Submitted),
                status_message: Some(None),
                prefect_flow_run_id: Some(Some("run-1".into())),
                prefect_deployment_id: Some(Some("dep-1".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.status, TaskStatus::Submitted);
        assert_eq!(updated.prefect_flow_run_id.as_deref(), Some("run-1"));
        assert_eq!(updated.prefect_deployment_id.as_deref(), Some("dep-1"));
        assert!(updated.status_message.is_none());
    }

    #[tokio::test]
    async fn update_execution_requires_at_least_one_field() {
        let db = DBService::new_in_memory().await.unwrap();
        let id = Uuid::new_v4();
        Task::create(&db.pool, &pending_task("t"), id).await.unwrap();

        let err = Task::update_execution(&db.pool, id, UpdateTaskExecution::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::NoExecutionFields));
    }

    #[tokio::test]
    async fn soft_deleted_tasks_are_hidden_from_reads() {
        let db = DBService::new_in_memory().await.unwrap();
        let id = Uuid::new_v4();
        Task::create(&db.pool, &pending_task("t"), id).await.unwrap();

        assert_eq!(Task::delete(&db.pool, id).await.unwrap(), 1);
        assert!(Task::find_by_id(&db.pool, id).await.unwrap().is_none());
        assert!(Task::find_all(&db.pool).await.unwrap().is_empty());

        let err = Task::update_execution(
            &db.pool,
            id,
            UpdateTaskExecution {
                status: Some(TaskStatus::Running),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TaskError::NotFound));
    }
}
