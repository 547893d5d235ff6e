//! Metadata extraction and classification pipeline.
//!
//! An image's embedded workflow is read into a [`NodeGraph`], node
//! references are resolved through [`resolver`], and the classifier
//! derives the primary checkpoint and grouping signature used to bucket
//! files.

pub mod classify;
pub mod graph;
pub mod reader;
pub mod report;
pub mod resolver;
pub mod signature;

pub use classify::{
    extract_checkpoints, extract_loras, extract_primary_checkpoint, extract_prompts,
    extract_sampling_params, search_metadata, Prompts, SamplingParams,
};
pub use graph::{as_node_ref, NodeGraph, NodeKind, NodeRecord};
pub use reader::{read_text_chunks, ExtractionStats, FailureReason, MetadataReader};
pub use report::format_metadata;
pub use resolver::{resolve_numeric, resolve_text};
pub use signature::{grouping_signature, NO_CHECKPOINT};
