use std::collections::BTreeMap;

use db::models::{
    geometry::CreateGeometry,
    task::TaskWithLayers,
    task_layer::LayerMode,
    task_layer_constraint::ConstraintType,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Task creation payload accepted by the API surface.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub name: String,
    pub description: Option<String>,
    pub layers: Vec<CreateTaskLayerRequest>,
    #[serde(default)]
    pub geometries: Vec<CreateGeometry>,
    pub budget: Option<CreateTaskLayerRequest>,
    pub resolution: Option<i64>,
    pub resampling: Option<String>,
    pub variant: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskLayerRequest {
    pub layer_name: String,
    pub description: Option<String>,
    pub mode: LayerMode,
    pub importance: Option<f64>,
    pub threshold: Option<f64>,
    #[serde(default)]
    pub constraints: Vec<CreateConstraintRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConstraintRequest {
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Parameter shape the optimization flow expects. Layers are keyed by name,
/// so duplicate names collapse to the last definition.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationParameters {
    pub resolution: i64,
    pub resampling: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub layers: BTreeMap<String, OptimizationLayer>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub geometry: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationLayer {
    pub mode: LayerMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub constraints: Vec<CreateConstraintRequest>,
}

pub const DEFAULT_RESOLUTION: i64 = 1000;
pub const DEFAULT_RESAMPLING: &str = "mode";

pub fn build_optimization_parameters(request: &CreateTaskRequest) -> OptimizationParameters {
    let mut layers = BTreeMap::new();

    let mut add_layer = |layer: &CreateTaskLayerRequest| {
        layers.insert(
            layer.layer_name.clone(),
            OptimizationLayer {
                mode: layer.mode,
                importance: layer.importance,
                threshold: layer.threshold,
                constraints: layer.constraints.clone(),
            },
        );
    };

    for layer in &request.layers {
        add_layer(layer);
    }
    if let Some(budget) = &request.budget {
        add_layer(budget);
    }

    OptimizationParameters {
        resolution: request.resolution.unwrap_or(DEFAULT_RESOLUTION),
        resampling: request
            .resampling
            .clone()
            .unwrap_or_else(|| DEFAULT_RESAMPLING.to_string()),
        variant: request.variant.clone(),
        layers,
        geometry: request
            .geometries
            .iter()
            .map(|g| json!({ "geojson": g.geojson }))
            .collect(),
    }
}

/// Rebuilds submission parameters from persisted state, for resubmission of
/// an already-created task.
pub fn rebuild_optimization_parameters(task: &TaskWithLayers) -> OptimizationParameters {
    let mut layers = BTreeMap::new();

    for layer in &task.layers {
        layers.insert(
            layer.layer.layer_name.clone(),
            OptimizationLayer {
                mode: layer.layer.mode,
                importance: layer.layer.importance,
                threshold: layer.layer.threshold,
                constraints: layer
                    .constraints
                    .iter()
                    .map(|c| CreateConstraintRequest {
                        constraint_type: c.constraint_type,
                        min: c.min,
                        max: c.max,
                    })
                    .collect(),
            },
        );
    }

    let geometry = task
        .geometries
        .iter()
        .filter_map(|g| serde_json::from_str::<Value>(&g.geojson).ok())
        .map(|geojson| json!({ "geojson": geojson }))
        .collect();

    OptimizationParameters {
        resolution: task.task.resolution.unwrap_or(DEFAULT_RESOLUTION),
        resampling: task
            .task
            .resampling
            .clone()
            .unwrap_or_else(|| DEFAULT_RESAMPLING.to_string()),
        variant: task.task.variant.clone(),
        layers,
        geometry,
    }
}
