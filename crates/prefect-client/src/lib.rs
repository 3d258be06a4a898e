//! Prefect Client - HTTP client for submitting optimization runs to Prefect
//!
//! Used by the task orchestrator to:
//! - Resolve deployment IDs by flow and deployment name
//! - Submit strict-optimization flow runs for tasks
//! - Submit tiling flow runs for task tiles

use reqwest::Client;
use serde_json::json;
use uuid::Uuid;

pub mod types;
pub use types::*;

/// Error types for Prefect client operations. The orchestrator does not
/// distinguish engine-down from bad parameters; both variants surface as a
/// submission failure recorded on the task.
#[derive(Debug, thiserror::Error)]
pub enum PrefectClientError {
    #[error("Failed to resolve Prefect deployment: {0}")]
    DeploymentResolution(String),
    #[error("Failed to submit Prefect flow run: {0}")]
    Submission(String),
}

/// Client for the Prefect orchestration API.
#[derive(Clone)]
pub struct PrefectClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl PrefectClient {
    /// Create a new Prefect client with the given base URL and optional API key.
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    /// Resolves a Prefect deployment ID by flow and deployment name.
    pub async fn resolve_deployment_id(
        &self,
        flow_name: &str,
        deployment_name: &str,
    ) -> Result<String, PrefectClientError> {
        let url = format!(
            "{}/deployments/name/{}/{}",
            self.base_url, flow_name, deployment_name
        );
        let resp = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| PrefectClientError::DeploymentResolution(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PrefectClientError::DeploymentResolution(format!(
                "deployment {flow_name}/{deployment_name} returned {}",
                resp.status()
            )));
        }

        let data: DeploymentResponse = resp
            .json()
            .await
            .map_err(|e| PrefectClientError::DeploymentResolution(e.to_string()))?;

        Ok(data.id)
    }

    /// Submits a flow run for a deployment and returns the Prefect run ID.
    pub async fn submit_flow_run(
        &self,
        deployment_id: &str,
        parameters: serde_json::Value,
    ) -> Result<String, PrefectClientError> {
        let url = format!("{}/deployments/{}/create_flow_run", self.base_url, deployment_id);
        let resp = self
            .request(self.client.post(&url))
            .json(&FlowRunRequest { parameters })
            .send()
            .await
            .map_err(|e| PrefectClientError::Submission(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PrefectClientError::Submission(format!(
                "deployment {deployment_id} returned {}",
                resp.status()
            )));
        }

        let data: FlowRunResponse = resp
            .json()
            .await
            .map_err(|e| PrefectClientError::Submission(e.to_string()))?;

        Ok(data.id)
    }

    /// Submits a strict optimization run and returns both tracking IDs.
    pub async fn submit_strict_optimization(
        &self,
        task_id: Uuid,
        parameters: serde_json::Value,
    ) -> Result<EngineSubmission, PrefectClientError> {
        let deployment_id = self
            .resolve_deployment_id("strict_optimization", "strict-optimization")
            .await?;
        let flow_run_id = self
            .submit_flow_run(
                &deployment_id,
                json!({ "task_id": task_id, "conditions": parameters }),
            )
            .await?;

        tracing::debug!(
            "submitted optimization run {} for task {}",
            flow_run_id,
            task_id
        );

        Ok(EngineSubmission {
            deployment_id,
            flow_run_id,
        })
    }

    /// Submits a tiling run for a task tile and returns both tracking IDs.
    pub async fn submit_task_tile(
        &self,
        task_id: Uuid,
        task_tile_id: Uuid,
    ) -> Result<EngineSubmission, PrefectClientError> {
        let deployment_id = self.resolve_deployment_id("task_tile", "task-tile").await?;
        let flow_run_id = self
            .submit_flow_run(
                &deployment_id,
                json!({ "task_id": task_id, "task_tile_id": task_tile_id }),
            )
            .await?;

        Ok(EngineSubmission {
            deployment_id,
            flow_run_id,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}
