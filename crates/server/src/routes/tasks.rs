use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::task::{Task, TaskWithLayers};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};
use services::services::optimization::CreateTaskRequest;

#[derive(Debug, Deserialize)]
pub struct RetryTaskBody {
    pub status: String,
}

pub async fn get_tasks(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = Task::find_all(&state.db.pool).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TaskWithLayers>>, ApiError> {
    let task = Task::find_with_children(&state.db.pool, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<ResponseJson<ApiResponse<TaskWithLayers>>, ApiError> {
    tracing::debug!("Creating task '{}'", payload.name);

    let task = state.orchestrator.create_task_and_submit(&payload).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// Moves a resolved task back to `draft` or resubmits it as `pending`.
pub async fn retry_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<RetryTaskBody>,
) -> Result<ResponseJson<ApiResponse<TaskWithLayers>>, ApiError> {
    tracing::debug!("Retrying task {} as '{}'", task_id, payload.status);

    let task = state
        .orchestrator
        .retry_task(task_id, &payload.status)
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Task::delete(&state.db.pool, task_id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("Task not found".into()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/task", get(get_tasks).post(create_task))
        .route("/task/{task_id}", get(get_task).delete(delete_task))
        // GET on the status path is a status channel upgrade, handled by the
        // same dispatcher as the top-level fallback.
        .route(
            "/task/{task_id}/status",
            put(retry_task).get(crate::ws::channel_upgrade),
        )
}
