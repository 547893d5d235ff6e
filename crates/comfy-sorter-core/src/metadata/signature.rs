//! Canonical grouping signatures.
//!
//! A signature combines the primary checkpoint with the sorted,
//! de-duplicated LoRA set so that two images produced by the same model
//! configuration always map to the same key, regardless of node order
//! inside their graphs.

use super::classify::{extract_loras, extract_primary_checkpoint};
use super::graph::NodeGraph;

/// Signature component used when no checkpoint could be resolved
pub const NO_CHECKPOINT: &str = "None";

/// Build the grouping signature for a graph.
///
/// Shape: `"{checkpoint} | {lora1,lora2}"`, or the bare checkpoint when
/// no LoRAs are loaded.
pub fn grouping_signature(graph: &NodeGraph) -> String {
    let primary =
        extract_primary_checkpoint(graph).unwrap_or_else(|| NO_CHECKPOINT.to_string());
    let loras = extract_loras(graph);

    if loras.is_empty() {
        primary
    } else {
        format!("{} | {}", primary, loras.join(","))
    }
}

// -- Tests --
