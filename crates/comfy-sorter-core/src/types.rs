use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// Supported image formats
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    Webp,
    Other(String),
}

impl ImageFormat {
    /// Determine format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "gif" => Self::Gif,
            "bmp" => Self::Bmp,
            "tif" | "tiff" => Self::Tiff,
            "webp" => Self::Webp,
            other => Self::Other(other.to_string()),
        }
    }

    /// Check if format is supported
    pub fn is_supported(&self) -> bool {
        match self {
            Self::Png | Self::Jpeg | Self::Gif | Self::Bmp | Self::Tiff | Self::Webp => true,
            Self::Other(_) => false,
        }
    }

    /// Only PNG files carry embedded workflow metadata
    pub fn carries_metadata(&self) -> bool {
        matches!(self, Self::Png)
    }
}

/// Representation of an image file discovered for sorting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFile {
    /// Full path to the image file
    pub path: PathBuf,

    /// Subdirectory relative to the scan root, empty for files at the root.
    /// Used to preserve structure inside the destination folder.
    pub rel_dir: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// Last modified timestamp
    pub last_modified: SystemTime,

    /// Image format
    pub format: ImageFormat,
}

/// Outcome of classifying a single file's workflow graph.
///
/// Computed once per file during a batch pass and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    /// Base (non-refiner) checkpoint name, if one was found
    pub primary_checkpoint: Option<String>,

    /// Canonical "checkpoint | lora,lora" signature
    pub grouping_signature: String,

    /// True when a graph was present but no checkpoint could be resolved
    pub is_unknown: bool,
}
