use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::{task::TaskError, task_tile::TaskTileError};
use services::services::{
    snapshot::SnapshotError, task_orchestrator::OrchestratorError, task_tile::TaskTileServiceError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Internal Server Error: {0}")]
    InternalError(String),
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Database(e) => ApiError::Database(e),
            TaskError::NotFound => ApiError::NotFound("Task not found".into()),
            TaskError::NoExecutionFields => {
                ApiError::BadRequest("No execution fields to update".into())
            }
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Task(e) => e.into(),
            OrchestratorError::Database(e) => ApiError::Database(e),
            OrchestratorError::Serialization(e) => ApiError::InternalError(e.to_string()),
            OrchestratorError::TaskNotFound(_) => ApiError::NotFound("Task not found".into()),
            OrchestratorError::InvalidRetryStatus(_) => {
                ApiError::BadRequest("Status must be pending or draft to update task.".into())
            }
            OrchestratorError::RunInFlight(_) => {
                ApiError::Conflict("Task has a run in flight and cannot be resubmitted".into())
            }
        }
    }
}

impl From<SnapshotError> for ApiError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Database(e) => ApiError::Database(e),
            SnapshotError::TaskNotFound(_) => ApiError::NotFound("Task not found".into()),
        }
    }
}

impl From<TaskTileServiceError> for ApiError {
    fn from(err: TaskTileServiceError) -> Self {
        match err {
            TaskTileServiceError::Tile(TaskTileError::Database(e)) => ApiError::Database(e),
            TaskTileServiceError::Tile(TaskTileError::NotFound) => {
                ApiError::NotFound("Task tile not found".into())
            }
            TaskTileServiceError::Tile(TaskTileError::ActiveTileExists) => {
                ApiError::Conflict("Task already has a tile in progress".into())
            }
            TaskTileServiceError::Task(e) => e.into(),
            TaskTileServiceError::Database(e) => ApiError::Database(e),
            TaskTileServiceError::TaskNotFound(_) => ApiError::NotFound("Task not found".into()),
            TaskTileServiceError::DraftNotAllowed => {
                ApiError::BadRequest("Tile status callbacks cannot set status back to draft".into())
            }
            TaskTileServiceError::AlreadyResolved(_) => {
                ApiError::Conflict("Tile already reached a terminal status".into())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        let error_message = match &self {
            ApiError::Conflict(msg)
            | ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::InternalError(msg) => msg.clone(),
            _ => format!("{}: {}", error_type, self),
        };
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}
