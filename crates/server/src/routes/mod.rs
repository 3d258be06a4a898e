use axum::{Json, Router, middleware, routing::get};
use serde_json::{Value, json};

use crate::{AppState, middleware as app_middleware};

pub mod internal;
pub mod tasks;

async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub fn router(state: AppState) -> Router {
    let internal_routes = internal::router().layer(middleware::from_fn_with_state(
        state.clone(),
        app_middleware::require_service_key,
    ));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .merge(tasks::router())
        .nest("/internal", internal_routes);

    Router::new()
        .nest("/api", api_routes)
        .fallback(crate::ws::channel_upgrade)
        .with_state(state)
}
