//! Core functionality for organising AI-generated images.
//!
//! This library provides the foundational components for sorting
//! ComfyUI output by its embedded workflow metadata:
//! - File discovery and PNG text-chunk extraction
//! - Workflow graph parsing and checkpoint classification
//! - Grouped file placement with sidecar metadata reports
//! - Metadata search, tree flattening, and color sorting

// -- External Dependencies --

use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::Path;

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

// -- Public Modules --
pub mod batch;
pub mod cleanup;
pub mod color;
pub mod config;
pub mod discovery;
pub mod flatten;
pub mod logging;
pub mod metadata;
pub mod search;
pub mod sorter;
pub mod types;

use batch::BatchClassifier;
use metadata::{format_metadata, ExtractionStats, MetadataReader};
use sorter::{FileDetails, SortReport};

/// Full result of one checkpoint sorting run
#[derive(Debug)]
pub struct SortSummary {
    pub report: SortReport,
    pub extraction: ExtractionStats,

    /// Distinct checkpoint + LoRA configurations, when tracked
    pub distinct_signatures: usize,
}

/// Main entry point for the checkpoint sorting pipeline
pub struct CheckpointSorter {
    config: Config,
}

impl CheckpointSorter {
    /// Create a new CheckpointSorter with the provided configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run the full pipeline: discover, extract, classify, and sort
    pub fn sort_by_checkpoint(&self, source_dir: &Path, output_dir: &Path) -> Result<SortSummary> {
        info!("Discovering images in {}...", source_dir.display());
        let files = discovery::find_png_files(source_dir, self.config.preserve_structure)?;
        info!("Found {} PNG files", files.len());

        let mut reader = MetadataReader::new();
        let mut classifier = BatchClassifier::new(self.config.group_mode());
        let mut details = FileDetails::default();

        let progress_bar = ProgressBar::new(files.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("[{eta}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("##-"),
        );
        progress_bar.set_message("Reading workflow metadata...");

        for file in &files {
            let graph = reader.extract(&file.path);
            classifier.classify(&file.path, graph.as_ref());

            if self.config.write_sidecars {
                if let Some(graph) = &graph {
                    details
                        .sidecars
                        .insert(file.path.clone(), format_metadata(graph));
                }
            }
            if self.config.preserve_structure {
                details
                    .rel_dirs
                    .insert(file.path.clone(), file.rel_dir.clone());
            }

            progress_bar.inc(1);
            // graph dropped here, keeping peak memory independent of
            // batch size
        }
        progress_bar.finish_with_message("Metadata extraction complete");

        let extraction = reader.take_stats();
        info!(
            "Extracted metadata from {}/{} files ({:.1}% success)",
            extraction.successful,
            extraction.total_processed,
            extraction.success_rate()
        );

        let outcome = classifier.finish();
        let report = sorter::sort_groups(&outcome, output_dir, &self.config, &details)?;

        info!(
            "Sorted {} images into {} folders",
            report.sorted_images, report.folders_created
        );

        Ok(SortSummary {
            report,
            extraction,
            distinct_signatures: outcome.distinct_signatures,
        })
    }
}
