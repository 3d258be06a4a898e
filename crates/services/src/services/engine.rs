use async_trait::async_trait;
use prefect_client::{EngineSubmission, PrefectClient, PrefectClientError};
use serde_json::Value;
use uuid::Uuid;

/// Workflow engine seam. The orchestrator and tile service only depend on
/// this trait, so tests can swap in a mock engine.
#[async_trait]
pub trait OptimizationEngine: Send + Sync {
    async fn submit_optimization(
        &self,
        task_id: Uuid,
        parameters: Value,
    ) -> Result<EngineSubmission, PrefectClientError>;

    async fn submit_tile_run(
        &self,
        task_id: Uuid,
        task_tile_id: Uuid,
    ) -> Result<EngineSubmission, PrefectClientError>;
}

#[async_trait]
impl OptimizationEngine for PrefectClient {
    async fn submit_optimization(
        &self,
        task_id: Uuid,
        parameters: Value,
    ) -> Result<EngineSubmission, PrefectClientError> {
        self.submit_strict_optimization(task_id, parameters).await
    }

    async fn submit_tile_run(
        &self,
        task_id: Uuid,
        task_tile_id: Uuid,
    ) -> Result<EngineSubmission, PrefectClientError> {
        self.submit_task_tile(task_id, task_tile_id).await
    }
}
