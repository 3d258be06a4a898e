use serde::{Deserialize, Serialize};

/// Response for `GET /deployments/name/{flow}/{deployment}`.
#[derive(Debug, Deserialize)]
pub struct DeploymentResponse {
    pub id: String,
}

/// Response for `POST /deployments/{id}/create_flow_run`.
#[derive(Debug, Deserialize)]
pub struct FlowRunResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct FlowRunRequest {
    pub parameters: serde_json::Value,
}

/// Identifiers issued by Prefect for a submitted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSubmission {
    pub deployment_id: String,
    pub flow_run_id: String,
}
