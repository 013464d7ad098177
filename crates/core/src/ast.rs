//! Raw AST shared by the text parser and the structured importer.
//!
//! This mirrors the Smithy JSON AST closely enough that a JSON model exported
//! by other Smithy tooling imports directly. No semantic checks happen here;
//! the [`builder`](crate::builder) normalizes everything.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Parser/importer output: shapes keyed by absolute id plus free-form metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAst {
    pub shapes: BTreeMap<String, RawShape>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// Reference to another shape: either a bare id or `{"target": id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShapeRef {
    Id(String),
    Target { target: String },
}

impl ShapeRef {
    pub fn id(&self) -> &str {
        match self {
            ShapeRef::Id(id) | ShapeRef::Target { target: id } => id,
        }
    }
}

impl From<String> for ShapeRef {
    fn from(id: String) -> Self {
        ShapeRef::Id(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMember {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawShape {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub shape_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// In declaration order.
    pub members: Option<IndexMap<String, RawMember>>,
    /// Alias or collection element target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ShapeRef>,
    /// List element in Smithy JSON AST form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<ShapeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<ShapeRef>,
    /// Map value in Smithy JSON AST form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ShapeRef>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<ShapeRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<ShapeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ShapeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ShapeRef>>,
}

impl RawShape {
    pub fn of_type(shape_type: &str) -> Self {
        Self {
            shape_type: Some(shape_type.to_string()),
            ..Self::default()
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        self.shape_type.as_deref()
    }
}

/// Union several partial ASTs in order. On a shape id or metadata key
/// collision the later AST wins.
pub fn merge(asts: impl IntoIterator<Item = RawAst>) -> RawAst {
    let mut merged = RawAst::default();
    for ast in asts {
        for (id, shape) in ast.shapes {
            if merged.shapes.insert(id.clone(), shape).is_some() {
                warn!(shape_id = %id, "Shape defined more than once; keeping the later definition.");
            }
        }
        for (key, value) in ast.metadata {
            if let Some(previous) = merged.metadata.insert(key.clone(), value)
                && merged.metadata.get(&key) != Some(&previous)
            {
                warn!(metadata_key = %key, "Conflicting metadata values; keeping the later one.");
            }
        }
    }
    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ast_with(id: &str, shape_type: &str, namespace: &str) -> RawAst {
        let mut ast = RawAst::default();
        ast.shapes.insert(id.to_string(), RawShape::of_type(shape_type));
        ast.metadata.insert("namespace".into(), json!(namespace));
        ast
    }

    #[test]
    fn test_merge_later_definition_wins() {
        let first = ast_with("ns#Item", "structure", "ns");
        let second = ast_with("ns#Item", "string", "ns");
        let merged = merge([first, second]);
        assert_eq!(merged.shapes.len(), 1);
        assert_eq!(merged.shapes["ns#Item"].type_name(), Some("string"));
    }

    #[test]
    fn test_merge_unions_distinct_shapes_and_metadata() {
        let mut first = ast_with("ns#A", "structure", "ns");
        first.metadata.insert("owner".into(), json!("team-a"));
        let second = ast_with("ns#B", "structure", "other");
        let merged = merge([first, second]);
        assert_eq!(merged.shapes.len(), 2);
        assert_eq!(merged.metadata["namespace"], json!("other"));
        assert_eq!(merged.metadata["owner"], json!("team-a"));
    }

    #[test]
    fn test_shape_ref_accepts_both_forms() {
        let bare: ShapeRef = serde_json::from_value(json!("ns#Input")).unwrap();
        let wrapped: ShapeRef = serde_json::from_value(json!({ "target": "ns#Input" })).unwrap();
        assert_eq!(bare.id(), "ns#Input");
        assert_eq!(wrapped.id(), "ns#Input");
    }
}
