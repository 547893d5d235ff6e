//! Checkpoint classification and related metadata analysis.
//!
//! The central heuristic distinguishes the base checkpoint from refiner
//! checkpoints so images group under the model that actually produced
//! them. Classification is first-found-wins per slot over the graph's
//! fixed iteration order; only the explicit `base_ckpt` override field
//! may replace an already-filled base slot.

use serde_json::Value;

use super::graph::{as_node_ref, NodeGraph, NodeRecord};
use super::resolver::{resolve_numeric, resolve_text};

/// Input fields that mark a node as refiner-related when present
const REFINER_FIELDS: [&str; 2] = ["refiner_ckpt", "refiner_model"];

/// Alternative checkpoint fields recognized by `extract_checkpoints`
const ALT_CHECKPOINT_FIELDS: [&str; 3] = ["model_name", "checkpoint", "base_model"];

/// Extract the primary (base, non-refiner) checkpoint name from a graph.
///
/// Returns the base slot if filled, falling back to the refiner slot,
/// else `None` for graphs with no recognizable checkpoint at all.
pub fn extract_primary_checkpoint(graph: &NodeGraph) -> Option<String> {
    let mut base: Option<String> = None;
    let mut refiner: Option<String> = None;

    for (_, node) in graph.iter() {
        // Explicit base checkpoint override takes highest priority and
        // replaces whatever a plain loader node put there earlier.
        if let Some(override_name) = node.input_str("base_ckpt") {
            if !override_name.is_empty() {
                base = Some(override_name.to_string());
            }
        }

        if let Some(ckpt) = node.input_str("ckpt_name") {
            if is_refiner_node(node) {
                if refiner.is_none() {
                    refiner = Some(ckpt.to_string());
                }
            } else if base.is_none() {
                base = Some(ckpt.to_string());
            }
        }

        // Dedicated refiner fields, used if nothing else fills the slot
        for field in REFINER_FIELDS {
            if refiner.is_none() {
                if let Some(name) = node.input_str(field) {
                    refiner = Some(name.to_string());
                }
            }
        }
    }

    base.or(refiner)
}

/// Heuristic for telling refiner loader/sampler nodes from base ones
fn is_refiner_node(node: &NodeRecord) -> bool {
    node.tagged_with("refiner")
        || node.has_input("start_at_step")
        || node.has_input("end_at_step")
        || REFINER_FIELDS.iter().any(|field| node.has_input(field))
}

/// Collect every checkpoint/model name mentioned in the graph,
/// de-duplicated and sorted
pub fn extract_checkpoints(graph: &NodeGraph) -> Vec<String> {
    let mut checkpoints = Vec::new();

    for (_, node) in graph.iter() {
        if let Some(name) = node.input_str("ckpt_name") {
            checkpoints.push(name.to_string());
        }
        for field in ALT_CHECKPOINT_FIELDS {
            if let Some(name) = node.input_str(field) {
                checkpoints.push(name.to_string());
            }
        }
    }

    checkpoints.sort();
    checkpoints.dedup();
    checkpoints
}

/// Collect every LoRA name loaded by the graph, de-duplicated and sorted
pub fn extract_loras(graph: &NodeGraph) -> Vec<String> {
    let mut loras: Vec<String> = graph
        .iter()
        .filter(|(_, node)| node.class_type == "LoraLoader")
        .filter_map(|(_, node)| node.input_str("lora_name"))
        .map(str::to_string)
        .collect();

    loras.sort();
    loras.dedup();
    loras
}

/// Sampling parameters pulled from the first sampler node found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingParams {
    pub steps: Option<f64>,
    pub cfg: Option<f64>,
    pub sampler_name: Option<String>,
    pub scheduler: Option<String>,
    pub denoise: Option<f64>,
}

impl SamplingParams {
    pub fn is_empty(&self) -> bool {
        self.steps.is_none()
            && self.cfg.is_none()
            && self.sampler_name.is_none()
            && self.scheduler.is_none()
            && self.denoise.is_none()
    }
}

/// Extract sampling parameters (steps, CFG, sampler, scheduler) from the
/// first KSampler node. Numeric inputs routed through primitive nodes
/// are resolved one hop.
pub fn extract_sampling_params(graph: &NodeGraph) -> SamplingParams {
    for (_, node) in graph.iter() {
        if node.class_type != "KSampler" && node.class_type != "KSamplerAdvanced" {
            continue;
        }

        let numeric =
            |name: &str| -> Option<f64> { resolve_numeric(graph, node.input(name)?) };

        return SamplingParams {
            steps: numeric("steps"),
            cfg: numeric("cfg"),
            sampler_name: node.input_str("sampler_name").map(str::to_string),
            scheduler: node.input_str("scheduler").map(str::to_string),
            denoise: numeric("denoise"),
        };
    }

    SamplingParams::default()
}

/// Positive and negative prompt texts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompts {
    pub positive: String,
    pub negative: String,
}

/// Extract prompts from text-encoder nodes. The first non-empty text
/// found is treated as positive, the second as negative, matching how
/// simple workflows wire their encoders.
pub fn extract_prompts(graph: &NodeGraph) -> Prompts {
    let mut prompts = Prompts::default();

    for (_, node) in graph.iter() {
        if node.class_type != "CLIPTextEncode" {
            continue;
        }
        let Some(text) = node.input("text").and_then(|v| text_value(graph, v)) else {
            continue;
        };

        if prompts.positive.is_empty() {
            prompts.positive = text;
        } else if prompts.negative.is_empty() {
            prompts.negative = text;
        }
    }

    prompts
}

/// Resolve a text input that is either a literal string or a reference
pub(crate) fn text_value(graph: &NodeGraph, value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        other => {
            let node_id = as_node_ref(other)?;
            resolve_text(graph, node_id)
        }
    }
}

/// Case-insensitive substring search over the whole serialized graph
pub fn search_metadata(graph: &NodeGraph, term: &str) -> bool {
    if term.is_empty() || graph.is_empty() {
        return false;
    }

    graph
        .to_json_string()
        .to_lowercase()
        .contains(&term.to_lowercase())
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::graph::NodeRecord;
    use serde_json::json;

    fn checkpoint_node(name: &str) -> NodeRecord {
        NodeRecord::new("CheckpointLoaderSimple").with_input("ckpt_name", json!(name))
    }

    #[test]
    fn test_base_takes_precedence_over_refiner() {
        let mut graph = NodeGraph::new();
        graph.insert("1", checkpoint_node("sdxl_base.safetensors"));
        graph.insert(
            "2",
            checkpoint_node("sdxl_refiner.safetensors").with_input("start_at_step", json!(5)),
        );

        assert_eq!(
            extract_primary_checkpoint(&graph).as_deref(),
            Some("sdxl_base.safetensors")
        );
    }

    #[test]
    fn test_refiner_only_graph_falls_back_to_refiner() {
        let mut graph = NodeGraph::new();
        graph.insert(
            "1",
            checkpoint_node("sdxl_refiner.safetensors").with_input("end_at_step", json!(25)),
        );

        assert_eq!(
            extract_primary_checkpoint(&graph).as_deref(),
            Some("sdxl_refiner.safetensors")
        );
    }

    #[test]
    fn test_refiner_detected_by_title() {
        let mut graph = NodeGraph::new();
        graph.insert("1", checkpoint_node("base.safetensors"));
        graph.insert(
            "2",
            checkpoint_node("refined.safetensors").with_title("Refiner Loader"),
        );

        assert_eq!(
            extract_primary_checkpoint(&graph).as_deref(),
            Some("base.safetensors")
        );
    }

    #[test]
    fn test_refiner_detected_by_class_type() {
        let mut graph = NodeGraph::new();
        // Sorts before the base node, so the heuristic has to do the work
        let mut refiner = NodeRecord::new("CheckpointLoaderRefiner");
        refiner = refiner.with_input("ckpt_name", json!("refined.safetensors"));
        graph.insert("0", refiner);
        graph.insert("1", checkpoint_node("base.safetensors"));

        assert_eq!(
            extract_primary_checkpoint(&graph).as_deref(),
            Some("base.safetensors")
        );
    }

    #[test]
    fn test_base_ckpt_override_always_wins() {
        let mut graph = NodeGraph::new();
        // "1" iterates before "2": the plain loader fills the base slot
        // first, then the override node replaces it anyway.
        graph.insert("1", checkpoint_node("ordinary.safetensors"));
        graph.insert(
            "2",
            NodeRecord::new("WorkflowConfig").with_input("base_ckpt", json!("forced.safetensors")),
        );

        assert_eq!(
            extract_primary_checkpoint(&graph).as_deref(),
            Some("forced.safetensors")
        );
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let mut graph = NodeGraph::new();
        graph.insert(
            "1",
            NodeRecord::new("WorkflowConfig").with_input("base_ckpt", json!("")),
        );
        graph.insert("2", checkpoint_node("real.safetensors"));

        assert_eq!(
            extract_primary_checkpoint(&graph).as_deref(),
            Some("real.safetensors")
        );
    }

    #[test]
    fn test_first_found_wins_per_slot() {
        let mut graph = NodeGraph::new();
        graph.insert("1", checkpoint_node("first.safetensors"));
        graph.insert("2", checkpoint_node("second.safetensors"));

        assert_eq!(
            extract_primary_checkpoint(&graph).as_deref(),
            Some("first.safetensors")
        );
    }

    #[test]
    fn test_dedicated_refiner_field_fills_refiner_slot() {
        let mut graph = NodeGraph::new();
        graph.insert(
            "1",
            NodeRecord::new("RefinerConfig").with_input("refiner_ckpt", json!("ref.safetensors")),
        );

        assert_eq!(
            extract_primary_checkpoint(&graph).as_deref(),
            Some("ref.safetensors")
        );
    }

    #[test]
    fn test_empty_graph_classifies_to_none() {
        assert_eq!(extract_primary_checkpoint(&NodeGraph::new()), None);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let mut graph = NodeGraph::new();
        graph.insert("1", checkpoint_node("model.safetensors"));
        graph.insert(
            "2",
            NodeRecord::new("LoraLoader").with_input("lora_name", json!("style.safetensors")),
        );

        let first = extract_primary_checkpoint(&graph);
        let second = extract_primary_checkpoint(&graph);
        assert_eq!(first, second);
    }

    #[test]
    fn test_extract_loras_dedupes_and_sorts() {
        let mut graph = NodeGraph::new();
        for (id, name) in [("3", "b.safetensors"), ("1", "a.safetensors"), ("2", "b.safetensors")]
        {
            graph.insert(
                id,
                NodeRecord::new("LoraLoader").with_input("lora_name", json!(name)),
            );
        }

        assert_eq!(
            extract_loras(&graph),
            vec!["a.safetensors".to_string(), "b.safetensors".to_string()]
        );
    }

    #[test]
    fn test_sampling_params_from_first_sampler() {
        let mut graph = NodeGraph::new();
        graph.insert(
            "4",
            NodeRecord::new("KSampler")
                .with_input("steps", json!(30))
                .with_input("cfg", json!(["9", 0]))
                .with_input("sampler_name", json!("euler"))
                .with_input("scheduler", json!("normal")),
        );
        graph.insert(
            "9",
            NodeRecord::new("PrimitiveNode").with_input("value", json!(7.0)),
        );

        let params = extract_sampling_params(&graph);
        assert_eq!(params.steps, Some(30.0));
        assert_eq!(params.cfg, Some(7.0));
        assert_eq!(params.sampler_name.as_deref(), Some("euler"));
        assert_eq!(params.scheduler.as_deref(), Some("normal"));
        assert_eq!(params.denoise, None);
    }

    #[test]
    fn test_sampling_params_empty_without_sampler_node() {
        let mut graph = NodeGraph::new();
        graph.insert("1", checkpoint_node("model.safetensors"));

        assert!(extract_sampling_params(&graph).is_empty());
        assert!(!extract_sampling_params(&sampler_graph()).is_empty());
    }

    fn sampler_graph() -> NodeGraph {
        let mut graph = NodeGraph::new();
        graph.insert(
            "1",
            NodeRecord::new("KSampler").with_input("steps", json!(20)),
        );
        graph
    }

    #[test]
    fn test_extract_prompts_positive_then_negative() {
        let mut graph = NodeGraph::new();
        graph.insert(
            "1",
            NodeRecord::new("CLIPTextEncode").with_input("text", json!("a sunny meadow")),
        );
        graph.insert(
            "2",
            NodeRecord::new("CLIPTextEncode").with_input("text", json!("blurry, low quality")),
        );

        let prompts = extract_prompts(&graph);
        assert_eq!(prompts.positive, "a sunny meadow");
        assert_eq!(prompts.negative, "blurry, low quality");
    }

    #[test]
    fn test_search_metadata_is_case_insensitive() {
        let mut graph = NodeGraph::new();
        graph.insert("1", checkpoint_node("DreamShaper_v8.safetensors"));

        assert!(search_metadata(&graph, "dreamshaper"));
        assert!(!search_metadata(&graph, "juggernaut"));
        assert!(!search_metadata(&graph, ""));
    }
}
