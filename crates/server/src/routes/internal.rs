use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{post, put},
};
use db::models::{
    task::{Task, TaskStatus, UpdateTaskExecution},
    task_tile::{TaskTile, UpdateTaskTileStatus},
};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Status write from a running workflow. `message` always overwrites,
/// `output_uri` only when present.
#[derive(Debug, Deserialize)]
pub struct UpdateTaskStatusBody {
    pub status: TaskStatus,
    pub message: Option<String>,
    pub output_uri: Option<String>,
}

pub async fn update_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskStatusBody>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    tracing::debug!("Workflow status callback for task {}: {}", task_id, payload.status);

    let task = Task::update_execution(
        &state.db.pool,
        task_id,
        UpdateTaskExecution {
            status: Some(payload.status),
            status_message: Some(payload.message),
            output_uri: payload.output_uri.map(Some),
            ..Default::default()
        },
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn create_task_tile(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TaskTile>>, ApiError> {
    let tile = state.tiles.create_tile(task_id).await?;
    Ok(ResponseJson(ApiResponse::success(tile)))
}

pub async fn update_task_tile_status(
    State(state): State<AppState>,
    Path(task_tile_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskTileStatus>,
) -> Result<ResponseJson<ApiResponse<TaskTile>>, ApiError> {
    tracing::debug!("Tile status callback for tile {}", task_tile_id);

    let tile = state
        .tiles
        .update_tile_status(task_tile_id, &payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(tile)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/task/{task_id}/status", put(update_task_status))
        .route("/task/{task_id}/tile", post(create_task_tile))
        .route(
            "/task-tile/{task_tile_id}/status",
            post(update_task_tile_status),
        )
}
