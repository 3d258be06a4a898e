use axum::extract::ws::WebSocket;
use futures_util::FutureExt;
use uuid::Uuid;

use crate::AppState;
use crate::ws::polling::{PollingChannel, SnapshotFetcher};
use services::services::StatusSnapshotService;
use services::services::snapshot::{SnapshotError, TaskStatusSnapshot};

/// Streams status snapshots for one task until it reaches a terminal
/// status or the peer disconnects.
pub async fn handle(socket: WebSocket, state: AppState, task_id: Uuid) {
    status_channel(state.snapshots.clone(), task_id)
        .run(socket)
        .await;
    tracing::debug!("status channel for task {} closed", task_id);
}

fn status_channel(
    snapshots: StatusSnapshotService,
    task_id: Uuid,
) -> PollingChannel<TaskStatusSnapshot, SnapshotError> {
    let fetch: SnapshotFetcher<TaskStatusSnapshot, SnapshotError> = Box::new(move || {
        let snapshots = snapshots.clone();
        async move { snapshots.get_snapshot(task_id).await }.boxed()
    });

    PollingChannel::new(fetch)
        .should_close(|snapshot: &TaskStatusSnapshot| snapshot.is_terminal())
        .non_fatal_errors(|e: &SnapshotError| matches!(e, SnapshotError::Database(_)))
}
