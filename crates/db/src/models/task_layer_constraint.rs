use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConstraintType {
    Percent,
    Unit,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskLayerConstraint {
    pub task_layer_constraint_id: Uuid,
    pub task_layer_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CreateTaskLayerConstraint {
    pub task_layer_id: Uuid,
    pub constraint_type: ConstraintType,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl TaskLayerConstraint {
    pub async fn create(
        executor: impl sqlx::SqliteExecutor<'_>,
        data: &CreateTaskLayerConstraint,
        task_layer_constraint_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TaskLayerConstraint>(
            "INSERT INTO task_layer_constraint (task_layer_constraint_id, task_layer_id, type, min, max) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING task_layer_constraint_id, task_layer_id, type, min, max",
        )
        .bind(task_layer_constraint_id)
        .bind(data.task_layer_id)
        .bind(data.constraint_type)
        .bind(data.min)
        .bind(data.max)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_layer_id(
        pool: &SqlitePool,
        task_layer_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskLayerConstraint>(
            "SELECT task_layer_constraint_id, task_layer_id, type, min, max \
             FROM task_layer_constraint WHERE task_layer_id = $1 ORDER BY created_at",
        )
        .bind(task_layer_id)
        .fetch_all(pool)
        .await
    }
}
