//! Extraction of embedded workflow metadata from PNG files.
//!
//! ComfyUI stores the workflow graph as JSON in PNG text chunks. The
//! reader tries a fixed list of chunk keywords in priority order and
//! never fails a batch over a single bad file: every per-file outcome
//! is folded into an `ExtractionStats` value instead.

use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::graph::NodeGraph;

/// Metadata slots tried in priority order. `prompt` is the ComfyUI
/// standard; `parameters` covers WebUI-style images whose value only
/// occasionally parses as JSON; the rest are rare fallbacks.
const METADATA_SLOTS: [&str; 5] = ["prompt", "parameters", "workflow", "extra_pnginfo", "exif"];

/// Why a file yielded no graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// File unreadable or not a valid PNG
    Corrupted,
    /// Decoder memory limits exceeded
    ResourceLimit,
    /// Valid PNG without any usable metadata slot
    NoMetadata,
    /// Anything else
    Unexpected,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Corrupted => "corrupted or unreadable file",
            Self::ResourceLimit => "decoder resource limit exceeded",
            Self::NoMetadata => "no metadata present",
            Self::Unexpected => "unexpected error",
        }
    }
}

/// Per-batch extraction counters. Exactly one counter is incremented
/// per `extract` call.
#[derive(Debug, Clone, Default)]
pub struct ExtractionStats {
    pub total_processed: usize,
    pub successful: usize,
    pub no_metadata: usize,
    pub corrupted: usize,
    pub resource_limit: usize,
    pub unexpected: usize,

    /// Paths that produced no graph, with the reason
    pub failed_files: Vec<(PathBuf, String)>,
}

impl ExtractionStats {
    fn record_success(&mut self) {
        self.total_processed += 1;
        self.successful += 1;
    }

    fn record_failure(&mut self, path: &Path, reason: FailureReason, detail: Option<String>) {
        self.total_processed += 1;
        match reason {
            FailureReason::Corrupted => self.corrupted += 1,
            FailureReason::ResourceLimit => self.resource_limit += 1,
            FailureReason::NoMetadata => self.no_metadata += 1,
            FailureReason::Unexpected => self.unexpected += 1,
        }

        let detail = match detail {
            Some(detail) => format!("{}: {}", reason.as_str(), detail),
            None => reason.as_str().to_string(),
        };
        self.failed_files.push((path.to_path_buf(), detail));
    }

    /// Share of processed files that yielded a graph, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total_processed as f64 * 100.0
    }
}

/// Reads embedded node graphs out of image files, accumulating
/// per-batch statistics along the way
#[derive(Debug, Default)]
pub struct MetadataReader {
    stats: ExtractionStats,
}

impl MetadataReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract the workflow graph from one image.
    ///
    /// Returns `None` for any per-file failure; the category is
    /// recorded in the statistics. Extraction is attempted once, with
    /// no retries.
    pub fn extract(&mut self, path: &Path) -> Option<NodeGraph> {
        let chunks = match read_text_chunks(path) {
            Ok(chunks) => chunks,
            Err(e) => {
                let reason = categorize_decode_error(&e);
                warn!("Metadata extraction failed for {}: {}", path.display(), e);
                self.stats.record_failure(path, reason, Some(e.to_string()));
                return None;
            }
        };

        for slot in METADATA_SLOTS {
            let Some(raw) = chunks.get(slot) else {
                continue;
            };
            match serde_json::from_str(raw) {
                Ok(value) => {
                    debug!("Found metadata in '{}' slot of {}", slot, path.display());
                    self.stats.record_success();
                    return Some(NodeGraph::from_value(&value));
                }
                // Malformed JSON in one slot falls through to the next
                Err(e) => {
                    debug!(
                        "Slot '{}' of {} is not valid JSON: {}",
                        slot,
                        path.display(),
                        e
                    );
                }
            }
        }

        self.stats
            .record_failure(path, FailureReason::NoMetadata, None);
        None
    }

    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    /// Hand the accumulated statistics to the caller and start fresh
    pub fn take_stats(&mut self) -> ExtractionStats {
        std::mem::take(&mut self.stats)
    }
}

/// Collect every textual chunk (tEXt, zTXt, iTXt) into a keyword map
pub fn read_text_chunks(path: &Path) -> Result<BTreeMap<String, String>, png::DecodingError> {
    let file = File::open(path).map_err(png::DecodingError::IoError)?;
    let decoder = png::Decoder::new(BufReader::new(file));
    let reader = decoder.read_info()?;
    let info = reader.info();

    let mut chunks = BTreeMap::new();

    for text in &info.uncompressed_latin1_text {
        chunks.insert(text.keyword.clone(), text.text.clone());
    }
    for text in &info.compressed_latin1_text {
        if let Ok(decoded) = text.get_text() {
            chunks.entry(text.keyword.clone()).or_insert(decoded);
        }
    }
    for text in &info.utf8_text {
        if let Ok(decoded) = text.get_text() {
            chunks.entry(text.keyword.clone()).or_insert(decoded);
        }
    }

    Ok(chunks)
}

fn categorize_decode_error(error: &png::DecodingError) -> FailureReason {
    match error {
        png::DecodingError::LimitsExceeded => FailureReason::ResourceLimit,
        png::DecodingError::IoError(_) | png::DecodingError::Format(_) => FailureReason::Corrupted,
        _ => FailureReason::Unexpected,
    }
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{BufWriter, Write};
    use tempfile::tempdir;

    fn write_png_with_chunks(path: &Path, chunks: &[(&str, String)]) {
        let file = File::create(path).unwrap();
        let mut encoder = png::Encoder::new(BufWriter::new(file), 1, 1);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        for (keyword, text) in chunks {
            encoder
                .add_text_chunk(keyword.to_string(), text.clone())
                .unwrap();
        }
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[0, 0, 0]).unwrap();
    }

    fn sample_workflow() -> String {
        json!({
            "1": {
                "class_type": "CheckpointLoaderSimple",
                "inputs": {"ckpt_name": "sdxl_base.safetensors"}
            }
        })
        .to_string()
    }

    #[test]
    fn test_extract_from_prompt_slot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("image.png");
        write_png_with_chunks(&path, &[("prompt", sample_workflow())]);

        let mut reader = MetadataReader::new();
        let graph = reader.extract(&path).unwrap();

        assert_eq!(graph.len(), 1);
        assert_eq!(reader.stats().successful, 1);
        assert_eq!(reader.stats().total_processed, 1);
    }

    #[test]
    fn test_malformed_slot_falls_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("image.png");
        write_png_with_chunks(
            &path,
            &[
                ("prompt", "not json {{".to_string()),
                ("workflow", sample_workflow()),
            ],
        );

        let mut reader = MetadataReader::new();
        let graph = reader.extract(&path).unwrap();

        assert_eq!(graph.len(), 1);
        assert_eq!(reader.stats().successful, 1);
    }

    #[test]
    fn test_no_metadata_counted_not_raised() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.png");
        write_png_with_chunks(&path, &[]);

        let mut reader = MetadataReader::new();
        assert!(reader.extract(&path).is_none());
        assert_eq!(reader.stats().no_metadata, 1);
        assert_eq!(reader.stats().successful, 0);
        assert_eq!(reader.stats().failed_files.len(), 1);
    }

    #[test]
    fn test_corrupt_file_counted_not_raised() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"this is not a png").unwrap();

        let mut reader = MetadataReader::new();
        assert!(reader.extract(&path).is_none());
        assert_eq!(reader.stats().corrupted, 1);
    }

    #[test]
    fn test_one_counter_per_call() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.png");
        let empty = dir.path().join("empty.png");
        write_png_with_chunks(&good, &[("prompt", sample_workflow())]);
        write_png_with_chunks(&empty, &[]);

        let mut reader = MetadataReader::new();
        reader.extract(&good);
        reader.extract(&empty);
        reader.extract(&good);

        let stats = reader.stats();
        assert_eq!(stats.total_processed, 3);
        assert_eq!(stats.successful + stats.no_metadata, 3);
        assert!((stats.success_rate() - 66.66).abs() < 1.0);
    }
}
