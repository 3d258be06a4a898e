use std::sync::Arc;

use db::DBService;
use db::models::{
    geometry::{Geometry, TaskGeometry},
    task::{CreateTask, Task, TaskError, TaskStatus, TaskWithLayers, UpdateTaskExecution},
    task_layer::{CreateTaskLayer, TaskLayer},
    task_layer_constraint::{CreateTaskLayerConstraint, TaskLayerConstraint},
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::engine::OptimizationEngine;
use crate::services::optimization::{
    CreateTaskLayerRequest, CreateTaskRequest, OptimizationParameters,
    build_optimization_parameters, rebuild_optimization_parameters,
};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Task {0} not found")]
    TaskNotFound(Uuid),
    #[error("Status must be pending or draft to update task, got '{0}'")]
    InvalidRetryStatus(String),
    #[error("Task {0} has a run in flight and cannot be resubmitted")]
    RunInFlight(Uuid),
}

/// The two outcomes a submission attempt can resolve to. Both are recorded
/// on the task row; neither is an error for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Submitted {
        flow_run_id: String,
        deployment_id: String,
    },
    FailedToSubmit {
        reason: String,
    },
}

/// Drives the task state machine: persists definitions, submits runs to the
/// workflow engine and records the resulting transition.
#[derive(Clone)]
pub struct TaskOrchestrator {
    db: DBService,
    engine: Arc<dyn OptimizationEngine>,
}

impl TaskOrchestrator {
    pub fn new(db: DBService, engine: Arc<dyn OptimizationEngine>) -> Self {
        Self { db, engine }
    }

    /// Persists the task and all of its children in one transaction. The
    /// task starts out `pending` with no engine linkage.
    pub async fn create_task(
        &self,
        request: &CreateTaskRequest,
    ) -> Result<TaskWithLayers, OrchestratorError> {
        let task_id = Uuid::new_v4();
        let mut tx = self.db.pool.begin().await?;

        Task::create(
            &mut *tx,
            &CreateTask {
                name: request.name.clone(),
                description: request.description.clone(),
                status: TaskStatus::Pending,
                resolution: request.resolution,
                resampling: request.resampling.clone(),
                variant: request.variant.clone(),
            },
            task_id,
        )
        .await?;

        for layer in &request.layers {
            Self::insert_layer(&mut tx, task_id, layer, false).await?;
        }
        if let Some(budget) = &request.budget {
            Self::insert_layer(&mut tx, task_id, budget, true).await?;
        }

        for geometry in &request.geometries {
            let geometry_id = Uuid::new_v4();
            Geometry::create(&mut *tx, geometry, geometry_id).await?;
            TaskGeometry::create(&mut *tx, task_id, geometry_id, Uuid::new_v4()).await?;
        }

        tx.commit().await?;
        info!(task_id = %task_id, "created task");

        self.hydrate(task_id).await
    }

    /// Creates the task, then submits it to the engine. The engine call runs
    /// after the creation transaction has committed, so a crash mid-submit
    /// never leaves an unrecorded run. Submission failure is recorded as
    /// `failed_to_submit` on the row, not returned as an error.
    pub async fn create_task_and_submit(
        &self,
        request: &CreateTaskRequest,
    ) -> Result<TaskWithLayers, OrchestratorError> {
        let task = self.create_task(request).await?;
        let task_id = task.task.task_id;

        let parameters = build_optimization_parameters(request);
        self.submit_and_record(task_id, parameters).await?;

        self.hydrate(task_id).await
    }

    /// Moves a resolved task back into the state machine. `draft` resets
    /// execution metadata without contacting the engine; `pending` rebuilds
    /// the submission parameters from persisted state and resubmits. Any
    /// other requested status is rejected before any write.
    pub async fn retry_task(
        &self,
        task_id: Uuid,
        requested_status: &str,
    ) -> Result<TaskWithLayers, OrchestratorError> {
        if requested_status != "draft" && requested_status != "pending" {
            return Err(OrchestratorError::InvalidRetryStatus(
                requested_status.to_string(),
            ));
        }

        let task = self.hydrate(task_id).await?;

        if task.task.status.is_in_flight() {
            return Err(OrchestratorError::RunInFlight(task_id));
        }

        if requested_status == "draft" {
            Task::update_execution(
                &self.db.pool,
                task_id,
                UpdateTaskExecution {
                    status: Some(TaskStatus::Draft),
                    status_message: Some(None),
                    prefect_flow_run_id: Some(None),
                    prefect_deployment_id: Some(None),
                    ..Default::default()
                },
            )
            .await?;
            info!(task_id = %task_id, "reset task to draft");
        } else {
            let parameters = rebuild_optimization_parameters(&task);
            self.submit_and_record(task_id, parameters).await?;
        }

        self.hydrate(task_id).await
    }

    /// Submits to the engine and records the outcome in a single execution
    /// metadata write, so status and run identifiers never disagree.
    async fn submit_and_record(
        &self,
        task_id: Uuid,
        parameters: OptimizationParameters,
    ) -> Result<SubmissionOutcome, OrchestratorError> {
        let parameters = serde_json::to_value(&parameters)?;

        let outcome = match self.engine.submit_optimization(task_id, parameters).await {
            Ok(submission) => SubmissionOutcome::Submitted {
                flow_run_id: submission.flow_run_id,
                deployment_id: submission.deployment_id,
            },
            Err(e) => SubmissionOutcome::FailedToSubmit {
                reason: e.to_string(),
            },
        };

        let updates = match &outcome {
            SubmissionOutcome::Submitted {
                flow_run_id,
                deployment_id,
            } => {
                info!(task_id = %task_id, flow_run_id = %flow_run_id, "submitted task run");
                UpdateTaskExecution {
                    status: Some(TaskStatus::Submitted),
                    status_message: Some(None),
                    prefect_flow_run_id: Some(Some(flow_run_id.clone())),
                    prefect_deployment_id: Some(Some(deployment_id.clone())),
                    ..Default::default()
                }
            }
            SubmissionOutcome::FailedToSubmit { reason } => {
                warn!(task_id = %task_id, reason = %reason, "task submission failed");
                UpdateTaskExecution {
                    status: Some(TaskStatus::FailedToSubmit),
                    status_message: Some(Some(reason.clone())),
                    ..Default::default()
                }
            }
        };

        Task::update_execution(&self.db.pool, task_id, updates).await?;
        Ok(outcome)
    }

    async fn insert_layer(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        task_id: Uuid,
        layer: &CreateTaskLayerRequest,
        is_budget: bool,
    ) -> Result<(), OrchestratorError> {
        let task_layer_id = Uuid::new_v4();
        TaskLayer::create(
            &mut **tx,
            &CreateTaskLayer {
                task_id,
                layer_name: layer.layer_name.clone(),
                description: layer.description.clone(),
                mode: layer.mode,
                importance: layer.importance,
                threshold: layer.threshold,
                is_budget,
            },
            task_layer_id,
        )
        .await?;

        for constraint in &layer.constraints {
            TaskLayerConstraint::create(
                &mut **tx,
                &CreateTaskLayerConstraint {
                    task_layer_id,
                    constraint_type: constraint.constraint_type,
                    min: constraint.min,
                    max: constraint.max,
                },
                Uuid::new_v4(),
            )
            .await?;
        }

        Ok(())
    }

    async fn hydrate(&self, task_id: Uuid) -> Result<TaskWithLayers, OrchestratorError> {
        Task::find_with_children(&self.db.pool, task_id)
            .await?
            .ok_or(OrchestratorError::TaskNotFound(task_id))
    }
}
