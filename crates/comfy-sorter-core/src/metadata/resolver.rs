//! Resolution of node input values that may be literals or references.
//!
//! The source graph is not guaranteed acyclic, so text resolution follows
//! a single reference chain with a fixed depth limit. A reference to a
//! missing node resolves to nothing; it never fails the extraction.

use serde_json::Value;

use super::graph::{as_node_ref, NodeGraph, NodeKind};

/// Maximum reference-chain length followed by `resolve_text`
const MAX_TEXT_DEPTH: usize = 8;

/// Input fields scanned, in order, when a numeric parameter is a reference
const NUMERIC_FIELDS: [&str; 5] = ["value", "float", "number", "cfg", "steps"];

/// Resolve a text value from the node with the given id.
///
/// Dispatches on the node's kind: literal providers return their string
/// field, display nodes return their captured text (following one more
/// reference if needed), and anything else falls back to a generic
/// `text` input. Unknown node ids resolve to `None`.
pub fn resolve_text(graph: &NodeGraph, node_id: &str) -> Option<String> {
    resolve_text_bounded(graph, node_id, MAX_TEXT_DEPTH)
}

fn resolve_text_bounded(graph: &NodeGraph, node_id: &str, depth: usize) -> Option<String> {
    if depth == 0 {
        return None;
    }

    let node = graph.get(node_id)?;

    match node.kind() {
        NodeKind::StringLiteral => node.input_str("string").map(|s| s.trim().to_string()),

        NodeKind::ShowText => {
            // ShowText stores the captured output in text_0; older
            // variants keep a plain or referenced text input instead.
            if let Some(text) = node.input_str("text_0") {
                return Some(text.trim().to_string());
            }
            match node.input("text") {
                Some(Value::String(text)) => Some(text.trim().to_string()),
                Some(value) => {
                    let upstream = as_node_ref(value)?;
                    resolve_text_bounded(graph, upstream, depth - 1)
                }
                None => None,
            }
        }

        // The loaded line lives only in the source file, not the metadata
        NodeKind::LoadLineFromFile => None,

        NodeKind::Other => match node.input("text")? {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .filter_map(scalar_to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                let joined = joined.trim().to_string();
                if joined.is_empty() {
                    None
                } else {
                    Some(joined)
                }
            }
            _ => None,
        },
    }
}

/// Resolve a numeric parameter that is either a literal or a reference.
///
/// References are followed a single hop: the referenced node is assumed
/// to be a terminal literal-provider and its inputs are scanned for the
/// first recognizable numeric field.
pub fn resolve_numeric(graph: &NodeGraph, value: &Value) -> Option<f64> {
    if let Some(number) = value.as_f64() {
        return Some(number);
    }

    let node = as_node_ref(value).and_then(|node_id| graph.get(node_id))?;

    for field in NUMERIC_FIELDS {
        if let Some(number) = node.input(field).and_then(Value::as_f64) {
            return Some(number);
        }
    }

    None
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// -- Tests --
