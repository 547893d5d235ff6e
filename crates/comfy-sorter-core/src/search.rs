//! Term search over embedded workflow metadata.
//!
//! Searches a source directory's PNGs for user-supplied terms and
//! gathers the matches into an output folder, optionally one subfolder
//! per matched term. Matching is plain substring search over selected
//! metadata fields.

use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery::find_png_files;
use crate::error::Result;
use crate::metadata::{
    extract_checkpoints, extract_loras, extract_prompts, extract_sampling_params, search_metadata,
    MetadataReader, NodeGraph,
};

/// How multiple search terms combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// A file matches if any term is found
    Any,

    /// A file matches only if every term is found
    All,

    /// Every term must appear in the combined searchable text; kept
    /// as a separate mode for compatibility with existing workflows
    Exact,
}

/// Which metadata fields a search scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Checkpoints,
    Loras,
    PositivePrompt,
    NegativePrompt,
    Prompts,
    SamplingParams,
    FullMetadata,
}

impl SearchField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "checkpoints" => Some(Self::Checkpoints),
            // `lora_name` kept as an alias for older saved searches
            "loras" | "lora_name" => Some(Self::Loras),
            "positive_prompt" => Some(Self::PositivePrompt),
            "negative_prompt" => Some(Self::NegativePrompt),
            "prompts" => Some(Self::Prompts),
            "sampling_params" => Some(Self::SamplingParams),
            "full_metadata" => Some(Self::FullMetadata),
            _ => None,
        }
    }

    /// Render the searchable text of this field from a graph
    fn text_of(&self, graph: &NodeGraph) -> String {
        match self {
            Self::Checkpoints => extract_checkpoints(graph).join("\n"),
            Self::Loras => extract_loras(graph).join("\n"),
            Self::PositivePrompt => extract_prompts(graph).positive,
            Self::NegativePrompt => extract_prompts(graph).negative,
            Self::Prompts => {
                let prompts = extract_prompts(graph);
                format!("{}\n{}", prompts.positive, prompts.negative)
            }
            Self::SamplingParams => {
                let params = extract_sampling_params(graph);
                format!(
                    "{} {} {} {} {}",
                    params.sampler_name.unwrap_or_default(),
                    params.scheduler.unwrap_or_default(),
                    params.steps.map(|v| v.to_string()).unwrap_or_default(),
                    params.cfg.map(|v| v.to_string()).unwrap_or_default(),
                    params.denoise.map(|v| v.to_string()).unwrap_or_default(),
                )
            }
            Self::FullMetadata => graph.to_json_string(),
        }
    }
}

/// Options for one search run
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub case_sensitive: bool,

    /// Fields to scan; None scans the full metadata
    pub fields: Option<Vec<SearchField>>,

    /// Move matches instead of copying them
    pub move_files: bool,

    /// Create one subfolder per matched term
    pub create_subfolders: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Any,
            case_sensitive: false,
            fields: None,
            move_files: false,
            create_subfolders: false,
        }
    }
}

/// Statistics for one search run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchReport {
    pub total_scanned: usize,
    pub matched: usize,
    pub no_metadata: usize,
    pub failed_operations: usize,
}

/// Search a source tree and gather matching files into `output_dir`.
///
/// A match lands in the subfolder of the first term it matched when
/// subfolders are enabled, so each file is placed exactly once.
pub fn search_and_sort(
    source_dir: &Path,
    output_dir: &Path,
    terms: &[String],
    options: &SearchOptions,
) -> Result<SearchReport> {
    let files = find_png_files(source_dir, true)?;
    let mut reader = MetadataReader::new();
    let mut report = SearchReport::default();

    info!(
        "Searching {} files for {} term(s)",
        files.len(),
        terms.len()
    );

    fs::create_dir_all(output_dir)?;

    for file in &files {
        report.total_scanned += 1;

        let Some(graph) = reader.extract(&file.path) else {
            report.no_metadata += 1;
            continue;
        };

        let Some(matched_term) = match_file(&graph, terms, options) else {
            continue;
        };

        let dest_folder = if options.create_subfolders {
            output_dir.join(folder_name_for_term(&matched_term))
        } else {
            output_dir.to_path_buf()
        };

        match gather_file(&file.path, &dest_folder, options.move_files) {
            Ok(dest) => {
                report.matched += 1;
                info!(
                    "Match '{}': {} -> {}",
                    matched_term,
                    file.path.display(),
                    dest.display()
                );
            }
            Err(e) => {
                report.failed_operations += 1;
                error!("Failed to gather {}: {}", file.path.display(), e);
            }
        }
    }

    Ok(report)
}

/// First matched term, or None if the file does not satisfy the mode
fn match_file(graph: &NodeGraph, terms: &[String], options: &SearchOptions) -> Option<String> {
    let haystack = searchable_text(graph, options);
    let haystack = normalize(&haystack, options.case_sensitive);

    let mut first_match = None;
    for term in terms {
        let found = match &options.fields {
            // The default full-metadata scan is case-insensitive
            None if !options.case_sensitive => search_metadata(graph, term),
            _ => {
                let needle = normalize(term, options.case_sensitive);
                haystack.contains(&needle)
            }
        };

        match options.mode {
            SearchMode::All | SearchMode::Exact if !found => return None,
            _ => {}
        }
        if found && first_match.is_none() {
            first_match = Some(term.clone());
        }
    }

    first_match
}

fn searchable_text(graph: &NodeGraph, options: &SearchOptions) -> String {
    match &options.fields {
        Some(fields) => fields
            .iter()
            .map(|field| field.text_of(graph))
            .collect::<Vec<_>>()
            .join("\n"),
        None => SearchField::FullMetadata.text_of(graph),
    }
}

fn normalize(text: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}

/// Safe folder name for a search term
fn folder_name_for_term(term: &str) -> String {
    term.chars()
        .map(|c| match c {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            other => other,
        })
        .take(50)
        .collect()
}

fn gather_file(source: &Path, dest_folder: &Path, move_files: bool) -> Result<PathBuf> {
    fs::create_dir_all(dest_folder)?;

    let filename = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.png".to_string());

    let mut dest = dest_folder.join(&filename);
    let mut counter = 1;
    while dest.exists() {
        let stem = Path::new(&filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = Path::new(&filename)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "png".to_string());
        dest = dest_folder.join(format!("{}_{}.{}", stem, counter, ext));
        counter += 1;
    }

    if move_files {
        match fs::rename(source, &dest) {
            Ok(()) => {}
            Err(_) => {
                fs::copy(source, &dest)?;
                fs::remove_file(source)?;
            }
        }
    } else {
        fs::copy(source, &dest)?;
    }

    Ok(dest)
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::NodeRecord;
    use serde_json::json;

    fn sample_graph() -> NodeGraph {
        let mut graph = NodeGraph::new();
        graph.insert(
            "1",
            NodeRecord::new("CheckpointLoaderSimple")
                .with_input("ckpt_name", json!("dreamshaperXL.safetensors")),
        );
        graph.insert(
            "2",
            NodeRecord::new("CLIPTextEncode")
                .with_input("text", json!("a castle at sunset, dramatic lighting")),
        );
        graph.insert(
            "3",
            NodeRecord::new("CLIPTextEncode")
                .with_input("text", json!("blurry, low quality"))
                .with_title("Negative Prompt"),
        );
        graph
    }

    #[test]
    fn test_any_mode_matches_first_term() {
        let graph = sample_graph();
        let options = SearchOptions::default();

        let terms = vec!["missing".to_string(), "castle".to_string()];
        let matched = match_file(&graph, &terms, &options);
        assert_eq!(matched.as_deref(), Some("castle"));
    }

    #[test]
    fn test_all_mode_requires_every_term() {
        let graph = sample_graph();
        let options = SearchOptions {
            mode: SearchMode::All,
            ..SearchOptions::default()
        };

        let terms = vec!["castle".to_string(), "sunset".to_string()];
        assert!(match_file(&graph, &terms, &options).is_some());

        let terms = vec!["castle".to_string(), "dragon".to_string()];
        assert!(match_file(&graph, &terms, &options).is_none());
    }

    #[test]
    fn test_case_sensitivity() {
        let graph = sample_graph();
        let terms = vec!["CASTLE".to_string()];

        let insensitive = SearchOptions::default();
        assert!(match_file(&graph, &terms, &insensitive).is_some());

        let sensitive = SearchOptions {
            case_sensitive: true,
            ..SearchOptions::default()
        };
        assert!(match_file(&graph, &terms, &sensitive).is_none());
    }

    #[test]
    fn test_field_restriction() {
        let graph = sample_graph();

        // "dreamshaper" appears in checkpoints but not in prompts
        let terms = vec!["dreamshaper".to_string()];
        let options = SearchOptions {
            fields: Some(vec![SearchField::Prompts]),
            ..SearchOptions::default()
        };
        assert!(match_file(&graph, &terms, &options).is_none());

        let options = SearchOptions {
            fields: Some(vec![SearchField::Checkpoints]),
            ..SearchOptions::default()
        };
        assert!(match_file(&graph, &terms, &options).is_some());
    }

    #[test]
    fn test_search_field_parse() {
        assert_eq!(
            SearchField::parse("checkpoints"),
            Some(SearchField::Checkpoints)
        );
        assert_eq!(
            SearchField::parse("full_metadata"),
            Some(SearchField::FullMetadata)
        );
        assert_eq!(SearchField::parse("bogus"), None);
    }

    #[test]
    fn test_folder_name_for_term() {
        assert_eq!(folder_name_for_term("castle"), "castle");
        assert_eq!(folder_name_for_term("a/b:c"), "a_b_c");
    }
}
