//! In-memory model of the workflow graph embedded in ComfyUI images.
//!
//! The metadata is a JSON object mapping node ids to node records. Node
//! inputs may hold literals or references to another node's output. The
//! model is built fresh per image and discarded after classification.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Recognized node roles for text resolution.
///
/// Tags are open-ended strings in the wire format, so anything we don't
/// recognize falls into `Other` and takes the generic text branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A literal-string provider ("String Literal" custom nodes)
    StringLiteral,
    /// A display node that captures its input text ("ShowText")
    ShowText,
    /// Reads a line from a file at generation time; the text itself is
    /// never embedded in the metadata
    LoadLineFromFile,
    /// Everything else
    Other,
}

impl NodeKind {
    pub fn from_class_type(class_type: &str) -> Self {
        if class_type.contains("String Literal") {
            Self::StringLiteral
        } else if class_type.contains("ShowText") {
            Self::ShowText
        } else if class_type.contains("Text Load Line From File") {
            Self::LoadLineFromFile
        } else {
            Self::Other
        }
    }
}

/// A single node in the workflow graph
#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    /// Type tag identifying the node's function, e.g. "CheckpointLoaderSimple"
    pub class_type: String,

    /// Parameter name to value mapping; values may be scalars or references
    pub inputs: Map<String, Value>,

    /// Human-assigned label from `_meta.title`, if present
    pub title: Option<String>,
}

impl NodeRecord {
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: Map::new(),
            title: None,
        }
    }

    /// Builder-style helper used heavily by tests
    pub fn with_input(mut self, name: &str, value: Value) -> Self {
        self.inputs.insert(name.to_string(), value);
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::from_class_type(&self.class_type)
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    pub fn input_str(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).and_then(Value::as_str)
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    /// True if the class type or title contains the needle, case-insensitively
    pub fn tagged_with(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.class_type.to_lowercase().contains(&needle)
            || self
                .title
                .as_deref()
                .map(|t| t.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}

/// The dependency graph of processing nodes extracted from one image.
///
/// Backed by a `BTreeMap` so iteration order is deterministic, which pins
/// down the first-found-wins classification policy.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct NodeGraph {
    nodes: BTreeMap<String, NodeRecord>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from parsed JSON.
    ///
    /// Anything that isn't an object (or object entries that aren't
    /// objects themselves) is skipped rather than rejected; partially
    /// saved workflows are common.
    pub fn from_value(value: &Value) -> Self {
        let mut graph = Self::new();

        if let Some(map) = value.as_object() {
            for (node_id, node_value) in map {
                let Some(node_obj) = node_value.as_object() else {
                    continue;
                };

                let class_type = node_obj
                    .get("class_type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();

                let inputs = node_obj
                    .get("inputs")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();

                let title = node_obj
                    .get("_meta")
                    .and_then(|meta| meta.get("title"))
                    .and_then(Value::as_str)
                    .map(str::to_string);

                graph.nodes.insert(
                    node_id.clone(),
                    NodeRecord {
                        class_type,
                        inputs,
                        title,
                    },
                );
            }
        }

        graph
    }

    pub fn insert(&mut self, node_id: impl Into<String>, record: NodeRecord) {
        self.nodes.insert(node_id.into(), record);
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeRecord> {
        self.nodes.get(node_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NodeRecord)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialized form used for full-metadata text search
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.nodes).unwrap_or_default()
    }
}

/// Interpret a parameter value as a node reference if it has the
/// `[node_id, slot_index]` shape, returning the referenced node id.
/// Malformed shapes are not references.
pub fn as_node_ref(value: &Value) -> Option<&str> {
    value.as_array()?.first()?.as_str()
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_graph_from_json_object() {
        let value = json!({
            "1": {
                "class_type": "CheckpointLoaderSimple",
                "inputs": {"ckpt_name": "sdxl_base.safetensors"},
                "_meta": {"title": "Load Checkpoint"}
            },
            "2": "not a node",
        });

        let graph = NodeGraph::from_value(&value);
        assert_eq!(graph.len(), 1);

        let node = graph.get("1").unwrap();
        assert_eq!(node.class_type, "CheckpointLoaderSimple");
        assert_eq!(node.title.as_deref(), Some("Load Checkpoint"));
        assert_eq!(node.input_str("ckpt_name"), Some("sdxl_base.safetensors"));
    }

    #[test]
    fn test_graph_from_non_object_is_empty() {
        assert!(NodeGraph::from_value(&json!([1, 2, 3])).is_empty());
        assert!(NodeGraph::from_value(&json!("plain text")).is_empty());
    }

    #[test]
    fn test_node_ref_shapes() {
        assert_eq!(as_node_ref(&json!(["4", 0])), Some("4"));

        // Bare id without a slot index still counts
        assert_eq!(as_node_ref(&json!(["4"])), Some("4"));

        // Malformed shapes are not references
        assert!(as_node_ref(&json!([])).is_none());
        assert!(as_node_ref(&json!([4, 0])).is_none());
        assert!(as_node_ref(&json!("4")).is_none());
        assert!(as_node_ref(&json!({"node": "4"})).is_none());
    }

    #[test]
    fn test_node_kind_dispatch() {
        assert_eq!(
            NodeKind::from_class_type("String Literal"),
            NodeKind::StringLiteral
        );
        assert_eq!(
            NodeKind::from_class_type("ShowText|pysssss"),
            NodeKind::ShowText
        );
        assert_eq!(
            NodeKind::from_class_type("Text Load Line From File"),
            NodeKind::LoadLineFromFile
        );
        assert_eq!(NodeKind::from_class_type("KSampler"), NodeKind::Other);
    }

    #[test]
    fn test_tagged_with_checks_title_and_class_type() {
        let node = NodeRecord::new("KSamplerAdvanced").with_title("Refiner Pass");
        assert!(node.tagged_with("refiner"));
        assert!(node.tagged_with("REFINER"));
        assert!(!node.tagged_with("upscale"));
    }
}
