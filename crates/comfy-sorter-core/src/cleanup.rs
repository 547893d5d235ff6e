//! Cleanup of directories left behind by earlier sorting runs.
//!
//! Strips generation artifacts (workflow tags, batch markers, counter
//! junk) out of image filenames and removes the sidecar metadata files
//! written next to sorted images. A dry run reports every planned
//! change without touching the filesystem.

use log::{error, info};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

use crate::error::Result;
use crate::types::ImageFormat;

/// Generation artifacts stripped from filenames, in order
static ARTIFACT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\[workflow[^\]]*\]\s*", // [workflow_test_batch1]
        r"Gen\s+\d+\s+",          // Gen 31
        r"\$\d+",                 // $0152
        r"^[\s\-_]+",             // Leading separators
        r"[\s\-_]+$",             // Trailing separators
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Regex for runs of whitespace
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Regex for consecutive underscores
static UNDERSCORE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_{2,}").unwrap());

/// Markers indicating a filename still carries generation artifacts
const ARTIFACT_MARKERS: [&str; 4] = ["[workflow", "$", "batch", "Gen "];

/// Names too generic to keep without a disambiguating suffix
const GENERIC_NAMES: [&str; 4] = ["image", "img", "pic", "photo"];

/// Options for one cleanup run
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Remove the `.txt` sidecar metadata files next to images
    pub remove_sidecars: bool,

    /// Clean generation artifacts out of image filenames
    pub rename_files: bool,

    /// Fallback name for files whose cleaned name comes out empty
    pub filename_prefix: String,

    /// Report planned changes without making them
    pub dry_run: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            remove_sidecars: true,
            rename_files: true,
            filename_prefix: "image".to_string(),
            dry_run: false,
        }
    }
}

/// Statistics for one cleanup run
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub total_files: usize,
    pub files_renamed: usize,
    pub sidecars_removed: usize,
    pub failed: usize,

    /// Renames as (old path, new filename); in a dry run these are the
    /// planned changes
    pub renames: Vec<(PathBuf, String)>,

    /// Sidecar files removed, or planned for removal in a dry run
    pub removals: Vec<PathBuf>,
}

/// Clean a directory tree of sorting artifacts
pub fn cleanup_directory(directory: &Path, options: &CleanupOptions) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();

    let files: Vec<PathBuf> = WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();

    report.total_files = files.len();
    info!("Cleaning {} files in {}", files.len(), directory.display());

    for path in &files {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if options.remove_sidecars && is_sidecar(path) {
            report.removals.push(path.clone());
            if options.dry_run {
                info!("Would remove sidecar: {}", filename);
                report.sidecars_removed += 1;
            } else {
                match fs::remove_file(path) {
                    Ok(()) => {
                        report.sidecars_removed += 1;
                        info!("Removed sidecar: {}", filename);
                    }
                    Err(e) => {
                        report.failed += 1;
                        error!("Failed to remove {}: {}", path.display(), e);
                    }
                }
            }
            continue;
        }

        if options.rename_files && needs_cleanup(filename) {
            let cleaned = clean_filename(filename, &options.filename_prefix);
            if cleaned == filename {
                continue;
            }

            report.renames.push((path.clone(), cleaned.clone()));
            if options.dry_run {
                info!("Would rename: {} -> {}", filename, cleaned);
                report.files_renamed += 1;
                continue;
            }

            let parent = path.parent().unwrap_or(directory);
            let dest = resolve_naming_conflict(parent.join(&cleaned));
            match fs::rename(path, &dest) {
                Ok(()) => {
                    report.files_renamed += 1;
                    info!("Renamed: {} -> {}", filename, dest.display());
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Failed to rename {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(report)
}

/// A `.txt` file is a sidecar only when an image with the same stem
/// sits next to it; unrelated text files are left alone.
fn is_sidecar(path: &Path) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some("txt") {
        return false;
    }

    ["png", "jpg", "jpeg", "gif", "webp"]
        .iter()
        .any(|ext| path.with_extension(ext).exists())
}

/// Only artifact-carrying image filenames are worth renaming
fn needs_cleanup(filename: &str) -> bool {
    if !ARTIFACT_MARKERS.iter().any(|marker| filename.contains(marker)) {
        return false;
    }

    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| ImageFormat::from_extension(ext).is_supported())
        .unwrap_or(false)
}

/// Strip generation artifacts out of a filename, keeping the extension
fn clean_filename(filename: &str, prefix: &str) -> String {
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (filename, None),
    };

    let mut cleaned = stem.to_string();
    for pattern in ARTIFACT_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    cleaned = WHITESPACE.replace_all(&cleaned, "_").into_owned();
    cleaned = UNDERSCORE_RUNS.replace_all(&cleaned, "_").into_owned();
    let mut cleaned = cleaned.trim_matches(['_', '-']).to_string();

    if cleaned.is_empty() {
        cleaned = prefix.to_string();
    }

    // Names as generic as the prefix itself get a disambiguating suffix
    let lowered = cleaned.to_lowercase();
    if lowered == prefix.to_lowercase() || GENERIC_NAMES.contains(&lowered.as_str()) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        cleaned = format!("{}_{}", prefix, timestamp);
    }

    match ext {
        Some(ext) => format!("{}.{}", cleaned, ext),
        None => cleaned,
    }
}

/// Resolve naming conflicts with zero-padded `_001`, `_002`, ... suffixes
fn resolve_naming_conflict(dest: PathBuf) -> PathBuf {
    if !dest.exists() {
        return dest;
    }

    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = dest.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = dest.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = match &ext {
            Some(ext) => parent.join(format!("{}_{:03}.{}", stem, counter, ext)),
            None => parent.join(format!("{}_{:03}", stem, counter)),
        };
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn make_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(b"data").unwrap();
        path
    }

    #[test]
    fn test_clean_filename_strips_artifacts() {
        assert_eq!(
            clean_filename("[workflow_test_batch1] castle.png", "image"),
            "castle.png"
        );
        assert_eq!(clean_filename("Gen 31 sunset.png", "image"), "sunset.png");
        assert_eq!(clean_filename("portrait$0152.png", "image"), "portrait.png");
        assert_eq!(
            clean_filename("a  spaced__name.png", "image"),
            "a_spaced_name.png"
        );
    }

    #[test]
    fn test_clean_filename_empty_falls_back_to_prefix_with_suffix() {
        // Nothing but artifacts left: falls back to the prefix, which is
        // generic and so gets a disambiguating suffix
        let cleaned = clean_filename("$0001.png", "image");
        assert!(cleaned.starts_with("image_"));
        assert!(cleaned.ends_with(".png"));
        assert_ne!(cleaned, "image.png");
    }

    #[test]
    fn test_needs_cleanup_only_flags_artifact_images() {
        assert!(needs_cleanup("[workflow] a.png"));
        assert!(needs_cleanup("Gen 5 b.jpg"));
        assert!(!needs_cleanup("already_clean.png"));
        // Artifact marker but not an image
        assert!(!needs_cleanup("Gen 5 notes.txt"));
    }

    #[test]
    fn test_cleanup_renames_and_removes_sidecars() {
        let dir = tempdir().unwrap();
        let image = make_file(dir.path(), "castle.png");
        let sidecar = make_file(dir.path(), "castle.txt");
        let tagged = make_file(dir.path(), "[workflow_test_batch2] tower.png");
        // A text file with no image next to it stays
        let notes = make_file(dir.path(), "notes.txt");

        let report = cleanup_directory(dir.path(), &CleanupOptions::default()).unwrap();

        assert_eq!(report.sidecars_removed, 1);
        assert_eq!(report.files_renamed, 1);
        assert_eq!(report.failed, 0);

        assert!(image.exists());
        assert!(!sidecar.exists());
        assert!(!tagged.exists());
        assert!(dir.path().join("tower.png").exists());
        assert!(notes.exists());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = tempdir().unwrap();
        make_file(dir.path(), "castle.png");
        let sidecar = make_file(dir.path(), "castle.txt");
        let tagged = make_file(dir.path(), "Gen 12 tower.png");

        let options = CleanupOptions {
            dry_run: true,
            ..CleanupOptions::default()
        };
        let report = cleanup_directory(dir.path(), &options).unwrap();

        assert_eq!(report.sidecars_removed, 1);
        assert_eq!(report.files_renamed, 1);
        assert_eq!(report.renames[0].1, "tower.png");
        assert_eq!(report.removals[0], sidecar);

        // Everything still in place
        assert!(sidecar.exists());
        assert!(tagged.exists());
    }

    #[test]
    fn test_rename_conflict_gets_padded_suffix() {
        let dir = tempdir().unwrap();
        make_file(dir.path(), "tower.png");
        make_file(dir.path(), "[workflow] tower.png");

        let options = CleanupOptions {
            remove_sidecars: false,
            ..CleanupOptions::default()
        };
        let report = cleanup_directory(dir.path(), &options).unwrap();

        assert_eq!(report.files_renamed, 1);
        assert!(dir.path().join("tower.png").exists());
        assert!(dir.path().join("tower_001.png").exists());
    }
}
