use std::sync::Arc;

use db::DBService;
use services::services::{StatusSnapshotService, TaskOrchestrator, TaskTileService};

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod ws;

pub use config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub orchestrator: TaskOrchestrator,
    pub snapshots: StatusSnapshotService,
    pub tiles: TaskTileService,
    pub config: Arc<ServerConfig>,
}
