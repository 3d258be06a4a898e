use axum::{
    extract::{
        State,
        ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::AppState;

pub mod polling;
pub mod router;
pub mod task_status;
#[cfg(test)]
pub(crate) mod testing;

/// Dispatches connection upgrades by path. Requests that match no channel
/// are rejected before the upgrade completes, so no half-open socket is
/// left behind.
pub async fn channel_upgrade(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    uri: Uri,
) -> Response {
    let Some(params) = router::match_route(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let Ok(ws) = ws else {
        return StatusCode::UPGRADE_REQUIRED.into_response();
    };

    match params {
        router::ChannelParams::TaskStatus { task_id } => ws.on_upgrade(move |socket| async move {
            task_status::handle(socket, state, task_id).await;
        }),
    }
}
