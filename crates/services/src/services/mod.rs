pub mod engine;
pub mod optimization;
pub mod snapshot;
pub mod task_orchestrator;
pub mod task_tile;

pub use engine::OptimizationEngine;
pub use snapshot::StatusSnapshotService;
pub use task_orchestrator::TaskOrchestrator;
pub use task_tile::TaskTileService;
