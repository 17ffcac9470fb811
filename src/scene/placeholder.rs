//! Placeholder substitution
//!
//! A node whose `id` is `PLACEHOLDER-<field>` takes its `text` from the
//! participant's `<field>` value. Nothing else in the document changes: node
//! count, order, types and every other attribute pass through as-is.

use serde_json::Value;

use super::SceneGraph;
use crate::Result;

/// Id prefix marking a placeholder node
pub const PLACEHOLDER_PREFIX: &str = "PLACEHOLDER-";

/// Participant field values keyed by field name
pub type FieldMap = serde_json::Map<String, Value>;

/// Field name addressed by a placeholder id, if the id is one
pub fn placeholder_field(id: &str) -> Option<&str> {
    id.strip_prefix(PLACEHOLDER_PREFIX).filter(|f| !f.is_empty())
}

/// Text to inject for a field value
///
/// Falsy values (`null`, `false`, zero and the empty string) count as absent
/// and leave the design text in place.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Return a copy of `scene` with every placeholder filled from `fields`
pub fn substitute(scene: &SceneGraph, fields: &FieldMap) -> SceneGraph {
    let mut out = scene.clone();
    out.for_each_node_mut(|node| {
        let Some(field) = node
            .get("id")
            .and_then(Value::as_str)
            .and_then(placeholder_field)
            .map(str::to_owned)
        else {
            return;
        };
        match fields.get(&field).and_then(field_text) {
            Some(text) => {
                node.insert("text".to_string(), Value::String(text));
            }
            None => log::debug!("No value for placeholder field `{}`, keeping design text", field),
        }
    });
    out
}

/// Document-level substitution: parse, rewrite, re-serialize
pub fn substitute_document(document: &str, fields: &FieldMap) -> Result<String> {
    let scene = SceneGraph::parse(document)?;
    Ok(substitute(&scene, fields).to_json())
}

/// Field names the design expects, in document order, without duplicates
pub fn placeholder_fields(scene: &SceneGraph) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    scene.for_each_node(|node| {
        if let Some(field) = node.get("id").and_then(Value::as_str).and_then(placeholder_field) {
            if !fields.iter().any(|f| f == field) {
                fields.push(field.to_string());
            }
        }
    });
    fields
}
