//! Renders a workflow graph into the sidecar text report written next
//! to sorted images.
//!
//! Section layout mirrors the reports users already have from earlier
//! tool versions, so the exact headings and ordering matter.

use serde_json::Value;

use super::classify::{extract_primary_checkpoint, text_value};
use super::graph::{as_node_ref, NodeGraph, NodeRecord};
use super::resolver::resolve_numeric;

/// Render the full metadata report for one image
pub fn format_metadata(graph: &NodeGraph) -> String {
    let mut lines = Vec::new();

    lines.extend(models_section(graph));
    lines.push(String::new());

    lines.extend(loras_section(graph));
    lines.push(String::new());

    lines.extend(positive_prompt_section(graph));
    lines.push(String::new());

    lines.extend(negative_prompt_section(graph));
    lines.push(String::new());
    lines.push(String::new());
    lines.push(String::new());

    lines.extend(sampling_section(graph));
    lines.push(String::new());

    lines.extend(image_parameters_section(graph));

    if let Some(upscale) = upscaling_section(graph) {
        lines.push(String::new());
        lines.extend(upscale);
    }

    lines.join("\n")
}

/// Strip directory components from a model path
fn file_name_only(name: &str) -> &str {
    name.rsplit(['\\', '/']).next().unwrap_or(name)
}

fn models_section(graph: &NodeGraph) -> Vec<String> {
    let mut lines = vec!["=== MODELS ===".to_string()];

    if let Some(base) = extract_primary_checkpoint(graph) {
        lines.push(format!("Base Model: {}", file_name_only(&base)));
    }

    let vae = graph
        .iter()
        .find(|(_, node)| node.class_type == "VAELoader")
        .and_then(|(_, node)| node.input_str("vae_name"));
    if let Some(vae) = vae {
        lines.push(format!("VAE: {}", file_name_only(vae)));
    }

    lines
}

fn loras_section(graph: &NodeGraph) -> Vec<String> {
    let mut lines = vec!["=== LORAS ===".to_string()];
    let mut count = 0usize;

    for (_, node) in graph.iter() {
        if node.class_type != "LoraLoader" {
            continue;
        }
        let Some(name) = node.input_str("lora_name") else {
            continue;
        };
        count += 1;

        let strength = |field: &str| {
            node.input(field)
                .and_then(|v| resolve_numeric(graph, v))
                .unwrap_or(1.0)
        };
        let model_strength = strength("strength_model");
        let clip_strength = strength("strength_clip");

        let mut entry = format!("LoRA {}: {}", count, file_name_only(name));
        if model_strength != 1.0 || clip_strength != 1.0 {
            entry.push_str(&format!(
                " (Model: {}, CLIP: {})",
                model_strength, clip_strength
            ));
        }
        lines.push(entry);
    }

    if count == 0 {
        lines.push("No LoRAs used".to_string());
    }

    lines
}

fn is_text_encoder(node: &NodeRecord) -> bool {
    matches!(
        node.class_type.as_str(),
        "CLIPTextEncode" | "CLIPTextEncodeSDXL" | "CLIPTextEncodeSDXLRefiner"
    )
}

fn is_negative_titled(node: &NodeRecord) -> bool {
    node.title
        .as_deref()
        .map(|t| {
            let t = t.to_lowercase();
            t.contains("negative") || t.contains("neg")
        })
        .unwrap_or(false)
}

fn positive_prompt_section(graph: &NodeGraph) -> Vec<String> {
    let mut lines = vec!["=== POSITIVE PROMPT ===".to_string()];

    let mut base_prompt = None;
    let mut refiner_prompt = None;

    for (_, node) in graph.iter() {
        if !is_text_encoder(node) || is_negative_titled(node) {
            continue;
        }
        let Some(text) = node.input("text").and_then(|v| text_value(graph, v)) else {
            continue;
        };

        // SDXL refiner encoders carry ascore/width alongside the text
        let is_refiner =
            node.tagged_with("refiner") || node.has_input("ascore") || node.has_input("width");

        if is_refiner {
            refiner_prompt.get_or_insert(text);
        } else {
            base_prompt.get_or_insert(text);
        }
    }

    if let Some(prompt) = base_prompt.or(refiner_prompt) {
        lines.push(prompt);
    }

    lines
}

fn negative_prompt_section(graph: &NodeGraph) -> Vec<String> {
    let mut lines = vec!["=== NEGATIVE PROMPT ===".to_string()];

    for (_, node) in graph.iter() {
        if !is_text_encoder(node) || !is_negative_titled(node) {
            continue;
        }
        if let Some(text) = node.input("text").and_then(|v| text_value(graph, v)) {
            lines.push(text);
            break;
        }
    }

    lines
}

fn sampling_section(graph: &NodeGraph) -> Vec<String> {
    let mut lines = vec!["=== SAMPLING PARAMETERS ===".to_string()];

    struct SamplerSlot {
        steps: Option<f64>,
        cfg: Option<f64>,
        sampler_name: Option<String>,
        scheduler: Option<String>,
    }
    let mut base: Option<SamplerSlot> = None;
    let mut refiner: Option<SamplerSlot> = None;

    for (_, node) in graph.iter() {
        if !node.class_type.to_lowercase().contains("sampler") {
            continue;
        }

        let numeric = |field: &str| node.input(field).and_then(|v| resolve_numeric(graph, v));

        // A sampler starting mid-schedule is the refiner pass
        let starts_late = numeric("start_at_step").map(|s| s > 0.0).unwrap_or(false);
        let is_refiner = node.tagged_with("refiner") || starts_late;

        let slot = SamplerSlot {
            steps: numeric("steps"),
            cfg: numeric("cfg"),
            sampler_name: node.input_str("sampler_name").map(str::to_string),
            scheduler: node.input_str("scheduler").map(str::to_string),
        };

        if is_refiner {
            refiner.get_or_insert(slot);
        } else {
            base.get_or_insert(slot);
        }
    }

    if let Some(slot) = base.or(refiner) {
        if let Some(steps) = slot.steps {
            lines.push(format!("Steps: {}", steps));
        }
        if let Some(cfg) = slot.cfg {
            lines.push(format!("Cfg: {}", cfg));
        }
        if let Some(name) = slot.sampler_name {
            lines.push(format!("Sampler Name: {}", name));
        }
        if let Some(scheduler) = slot.scheduler {
            lines.push(format!("Scheduler: {}", scheduler));
        }
    }

    lines
}

fn image_parameters_section(graph: &NodeGraph) -> Vec<String> {
    let mut lines = vec!["=== IMAGE PARAMETERS ===".to_string()];

    let mut width: Option<f64> = None;
    let mut height: Option<f64> = None;

    for (_, node) in graph.iter() {
        let numeric = |field: &str| node.input(field).and_then(|v| resolve_numeric(graph, v));

        if node.class_type.contains("SDXLEmptyLatentSizePicker") {
            // Resolution strings look like "896x1152 (0.78)"
            if let Some(resolution) = node.input_str("resolution") {
                if let Some((w, h)) = parse_resolution(resolution) {
                    width = Some(w);
                    height = Some(h);
                    break;
                }
            }
        } else if node.class_type.contains("EmptyLatent") || node.class_type.contains("LatentSize")
        {
            width = numeric("width").or(width);
            height = numeric("height").or(height);
        } else if node.class_type == "CLIPTextEncodeSDXLRefiner"
            && width.is_none()
            && height.is_none()
        {
            width = numeric("width");
            height = numeric("height");
        }
    }

    if let (Some(width), Some(height)) = (width, height) {
        if height > 0.0 {
            lines.push(format!("Width: {}", width));
            lines.push(format!("Height: {}", height));
            let aspect = (width / height * 100.0).round() / 100.0;
            lines.push(format!("Resolution: {}x{} ({})", width, height, aspect));
        }
    }

    lines
}

fn parse_resolution(resolution: &str) -> Option<(f64, f64)> {
    let size = resolution.split_whitespace().next()?;
    let (w, h) = size.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

fn upscaling_section(graph: &NodeGraph) -> Option<Vec<String>> {
    let mut lines = vec!["=== UPSCALING ===".to_string()];

    let model_for = |node: &NodeRecord| -> Option<String> {
        let node_id = as_node_ref(node.input("upscale_model")?)?;
        let loader = graph.get(node_id)?;
        if loader.class_type == "UpscaleModelLoader" {
            loader.input_str("model_name").map(str::to_string)
        } else {
            None
        }
    };

    let mut method = None;
    let mut upscale_model = None;
    let mut upscale_by = None;

    for (_, node) in graph.iter() {
        match node.class_type.as_str() {
            "ImageUpscaleWithModel" => {
                method = Some("ImageUpscaleWithModel");
                upscale_model = model_for(node);
                break;
            }
            "UltimateSDUpscale" => {
                method = Some("UltimateSDUpscale");
                upscale_by = node.input("upscale_by").and_then(|v| resolve_numeric(graph, v));
                upscale_model = model_for(node);
                break;
            }
            _ => {}
        }
    }

    if method.is_none() && upscale_model.is_none() {
        return None;
    }

    if let Some(method) = method {
        lines.push(format!("Method: {}", method));
    }
    if let Some(model) = upscale_model {
        lines.push(format!("Upscale Model: {}", model));
    }
    if let Some(factor) = upscale_by {
        if factor != 1.0 {
            lines.push(format!("Upscale Factor: {}x", factor));
        }
    }

    Some(lines)
}

// -- Tests --
