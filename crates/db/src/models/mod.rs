use serde::Serializer;

pub mod geometry;
pub mod task;
pub mod task_layer;
pub mod task_layer_constraint;
pub mod task_tile;

/// Serializes a TEXT column holding JSON as the parsed value rather than a
/// quoted string. Falls back to the raw text if the column is not valid JSON.
pub(crate) fn serialize_json_text<S: Serializer>(value: &str, s: S) -> Result<S::Ok, S::Error> {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(parsed) => serde::Serialize::serialize(&parsed, s),
        Err(_) => s.serialize_str(value),
    }
}
