use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Geometry {
    pub geometry_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(serialize_with = "super::serialize_json_text")]
    pub geojson: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGeometry {
    pub name: String,
    pub description: Option<String>,
    pub geojson: serde_json::Value,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TaskGeometry {
    pub task_geometry_id: Uuid,
    pub task_id: Uuid,
    pub geometry_id: Uuid,
}

/// Geometry joined through its task association, as returned to clients.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TaskGeometryWithGeometry {
    pub task_id: Uuid,
    pub geometry_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(serialize_with = "super::serialize_json_text")]
    pub geojson: String,
}

impl Geometry {
    pub async fn create(
        executor: impl sqlx::SqliteExecutor<'_>,
        data: &CreateGeometry,
        geometry_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let geojson = data.geojson.to_string();
        sqlx::query_as::<_, Geometry>(
            "INSERT INTO geometry (geometry_id, name, description, geojson) \
             VALUES ($1, $2, $3, $4) \
             RETURNING geometry_id, name, description, geojson",
        )
        .bind(geometry_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(geojson)
        .fetch_one(executor)
        .await
    }
}

impl TaskGeometry {
    pub async fn create(
        executor: impl sqlx::SqliteExecutor<'_>,
        task_id: Uuid,
        geometry_id: Uuid,
        task_geometry_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TaskGeometry>(
            "INSERT INTO task_geometry (task_geometry_id, task_id, geometry_id) \
             VALUES ($1, $2, $3) \
             RETURNING task_geometry_id, task_id, geometry_id",
        )
        .bind(task_geometry_id)
        .bind(task_id)
        .bind(geometry_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_with_geometry_by_task_id(
        pool: &SqlitePool,
        task_id: Uuid,
    ) -> Result<Vec<TaskGeometryWithGeometry>, sqlx::Error> {
        sqlx::query_as::<_, TaskGeometryWithGeometry>(
            "SELECT tg.task_id, g.geometry_id, g.name, g.description, g.geojson \
             FROM task_geometry tg \
             JOIN geometry g ON g.geometry_id = tg.geometry_id \
             WHERE tg.task_id = $1 \
             ORDER BY g.name",
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }
}
