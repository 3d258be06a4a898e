use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use uuid::Uuid;

use super::task_layer_constraint::TaskLayerConstraint;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LayerMode {
    Flexible,
    LockedIn,
    LockedOut,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskLayer {
    pub task_layer_id: Uuid,
    pub task_id: Uuid,
    pub layer_name: String,
    pub description: Option<String>,
    pub mode: LayerMode,
    pub importance: Option<f64>,
    pub threshold: Option<f64>,
    pub is_budget: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskLayerWithConstraints {
    #[serde(flatten)]
    pub layer: TaskLayer,
    pub constraints: Vec<TaskLayerConstraint>,
}

#[derive(Debug, Clone)]
pub struct CreateTaskLayer {
    pub task_id: Uuid,
    pub layer_name: String,
    pub description: Option<String>,
    pub mode: LayerMode,
    pub importance: Option<f64>,
    pub threshold: Option<f64>,
    pub is_budget: bool,
}

impl TaskLayer {
    pub async fn create(
        executor: impl sqlx::SqliteExecutor<'_>,
        data: &CreateTaskLayer,
        task_layer_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TaskLayer>(
            "INSERT INTO task_layer \
               (task_layer_id, task_id, layer_name, description, mode, importance, threshold, is_budget) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING task_layer_id, task_id, layer_name, description, mode, importance, threshold, is_budget",
        )
        .bind(task_layer_id)
        .bind(data.task_id)
        .bind(&data.layer_name)
        .bind(&data.description)
        .bind(data.mode)
        .bind(data.importance)
        .bind(data.threshold)
        .bind(data.is_budget)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_task_id(pool: &SqlitePool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskLayer>(
            "SELECT task_layer_id, task_id, layer_name, description, mode, importance, threshold, is_budget \
             FROM task_layer WHERE task_id = $1 ORDER BY created_at, layer_name",
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }
}
