//! Batch classification: partitioning a collection of files into named
//! groups by their primary checkpoint.
//!
//! Per-file failures never abort a batch. Files with a graph but no
//! resolvable checkpoint land in the `Unknown_Checkpoint` group; files
//! with no graph at all land in `No_Metadata`. The two are counted
//! separately and never merged.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::metadata::{extract_primary_checkpoint, grouping_signature, NodeGraph, NO_CHECKPOINT};
use crate::types::ClassificationResult;

/// Group for files whose graph yielded no checkpoint
pub const UNKNOWN_CHECKPOINT_GROUP: &str = "Unknown_Checkpoint";

/// Group for files without any extractable graph
pub const NO_METADATA_GROUP: &str = "No_Metadata";

/// Folder names are capped to keep paths portable
const MAX_FOLDER_NAME_LEN: usize = 50;

/// How files are bucketed into output folders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    /// One folder per cleaned checkpoint name
    ByCheckpoint,

    /// Folders are still per-checkpoint, but the full grouping
    /// signature is tracked to tell distinct model configurations apart
    ByCheckpointAndLoras,
}

/// Counters accumulated across one batch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounters {
    pub total: usize,
    pub unknown_checkpoint: usize,
    pub extraction_failed: usize,
}

/// Final result of a batch pass
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Group name to ordered file list
    pub groups: BTreeMap<String, Vec<PathBuf>>,

    pub counters: BatchCounters,

    /// Number of distinct grouping signatures seen; only populated in
    /// [`GroupMode::ByCheckpointAndLoras`]
    pub distinct_signatures: usize,
}

/// Incremental batch classifier.
///
/// Files are fed one at a time so callers can drop each graph as soon
/// as it has been classified, keeping peak memory bounded on large
/// batches.
#[derive(Debug)]
pub struct BatchClassifier {
    mode: GroupMode,
    groups: BTreeMap<String, Vec<PathBuf>>,
    counters: BatchCounters,
    signatures: BTreeSet<String>,
}

impl BatchClassifier {
    pub fn new(mode: GroupMode) -> Self {
        Self {
            mode,
            groups: BTreeMap::new(),
            counters: BatchCounters::default(),
            signatures: BTreeSet::new(),
        }
    }

    /// Classify one file and record it in its group
    pub fn classify(&mut self, path: &Path, graph: Option<&NodeGraph>) -> ClassificationResult {
        self.counters.total += 1;

        let Some(graph) = graph else {
            self.counters.extraction_failed += 1;
            self.push_group(NO_METADATA_GROUP.to_string(), path);
            return ClassificationResult {
                primary_checkpoint: None,
                grouping_signature: NO_CHECKPOINT.to_string(),
                is_unknown: false,
            };
        };

        let primary = extract_primary_checkpoint(graph);
        let signature = grouping_signature(graph);

        if self.mode == GroupMode::ByCheckpointAndLoras {
            self.signatures.insert(signature.clone());
        }

        match &primary {
            Some(checkpoint) => {
                self.push_group(clean_checkpoint_name(checkpoint), path);
            }
            None => {
                self.counters.unknown_checkpoint += 1;
                self.push_group(UNKNOWN_CHECKPOINT_GROUP.to_string(), path);
            }
        }

        ClassificationResult {
            is_unknown: primary.is_none(),
            primary_checkpoint: primary,
            grouping_signature: signature,
        }
    }

    pub fn finish(self) -> BatchOutcome {
        BatchOutcome {
            groups: self.groups,
            counters: self.counters,
            distinct_signatures: self.signatures.len(),
        }
    }

    fn push_group(&mut self, key: String, path: &Path) {
        self.groups.entry(key).or_default().push(path.to_path_buf());
    }
}

/// Classify an already-collected batch of (path, graph) pairs
pub fn classify_batch<I>(pairs: I, mode: GroupMode) -> BatchOutcome
where
    I: IntoIterator<Item = (PathBuf, Option<NodeGraph>)>,
{
    let mut classifier = BatchClassifier::new(mode);
    for (path, graph) in pairs {
        classifier.classify(&path, graph.as_ref());
        // graph dropped here, per-file
    }
    classifier.finish()
}

/// Turn a checkpoint name into a safe folder name.
///
/// Drops directory components and the file extension, replaces
/// filesystem-illegal characters with underscores, and caps the length.
/// Pure function of its input.
pub fn clean_checkpoint_name(checkpoint: &str) -> String {
    let base = checkpoint
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(checkpoint);

    let stem = match base.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => base,
    };

    stem.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            other => other,
        })
        .take(MAX_FOLDER_NAME_LEN)
        .collect()
}

// -- Tests --
