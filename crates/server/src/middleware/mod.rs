use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{AppState, error::ApiError};

pub const SERVICE_KEY_HEADER: &str = "x-internal-service-key";

/// Guards the collaborator-facing callback routes. Workflow runs identify
/// themselves with a shared key, not a user token.
pub async fn require_service_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = req
        .headers()
        .get(SERVICE_KEY_HEADER)
        .and_then(|h| h.to_str().ok());

    match provided {
        Some(key) if key == state.config.internal_service_key => Ok(next.run(req).await),
        _ => Err(ApiError::Unauthorized("Invalid service key".into())),
    }
}
