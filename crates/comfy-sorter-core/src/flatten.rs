//! Flattening of nested image trees into a single directory.
//!
//! Pulls every image out of a directory tree into its root, resolving
//! filename collisions, optionally renaming with a user prefix and
//! pruning the subdirectories left empty by the moves.

use log::{error, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::discovery::find_image_files;
use crate::error::Result;

/// Options for one flatten run
#[derive(Debug, Clone)]
pub struct FlattenOptions {
    /// Move files instead of copying them
    pub move_files: bool,

    /// Remove subdirectories emptied by the moves
    pub remove_empty_dirs: bool,

    /// Rename flattened files with sequential numbering
    pub rename_files: bool,

    /// Prefix for renamed files
    pub user_prefix: String,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            move_files: true,
            remove_empty_dirs: true,
            rename_files: false,
            user_prefix: String::new(),
        }
    }
}

/// Statistics for one flatten run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenReport {
    pub total_images: usize,
    pub processed: usize,
    pub failed: usize,
    pub duplicates_renamed: usize,
    pub empty_dirs_removed: usize,
}

/// What a flatten run would do, without touching any file
#[derive(Debug, Clone, Default)]
pub struct FlattenPreview {
    /// Images found per subfolder, keyed by path relative to the root
    pub images_per_folder: BTreeMap<PathBuf, usize>,

    /// Filenames that appear in more than one subfolder
    pub conflicting_names: Vec<String>,

    pub total_images: usize,
}

/// Flatten all images below `root` into `root` itself
pub fn flatten_images(root: &Path, options: &FlattenOptions) -> Result<FlattenReport> {
    let files = find_image_files(root, None)?;
    let mut report = FlattenReport::default();

    // Root-level files are already flat
    let nested: Vec<_> = files
        .into_iter()
        .filter(|f| !f.rel_dir.as_os_str().is_empty())
        .collect();

    report.total_images = nested.len();
    info!("Flattening {} nested images into {}", nested.len(), root.display());

    let mut sequence = 0usize;
    for file in &nested {
        sequence += 1;
        match flatten_one(&file.path, root, options, sequence, &mut report) {
            Ok(dest) => {
                report.processed += 1;
                info!("{} -> {}", file.path.display(), dest.display());
            }
            Err(e) => {
                report.failed += 1;
                error!("Failed to flatten {}: {}", file.path.display(), e);
            }
        }
    }

    if options.move_files && options.remove_empty_dirs {
        report.empty_dirs_removed = remove_empty_dirs(root);
    }

    Ok(report)
}

/// Report what [`flatten_images`] would do for this tree
pub fn preview_flatten(root: &Path) -> Result<FlattenPreview> {
    let files = find_image_files(root, None)?;
    let mut preview = FlattenPreview::default();
    let mut seen_names: BTreeMap<String, usize> = BTreeMap::new();

    for file in files {
        if file.rel_dir.as_os_str().is_empty() {
            continue;
        }
        preview.total_images += 1;
        *preview
            .images_per_folder
            .entry(file.rel_dir.clone())
            .or_default() += 1;

        if let Some(name) = file.path.file_name() {
            *seen_names.entry(name.to_string_lossy().into_owned()).or_default() += 1;
        }
    }

    preview.conflicting_names = seen_names
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name)
        .collect();

    Ok(preview)
}

fn flatten_one(
    source: &Path,
    root: &Path,
    options: &FlattenOptions,
    sequence: usize,
    report: &mut FlattenReport,
) -> Result<PathBuf> {
    let filename = if options.rename_files {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");
        let prefix = if options.user_prefix.is_empty() {
            "flattened"
        } else {
            &options.user_prefix
        };
        format!("{}_img{}.{}", prefix, sequence, ext)
    } else {
        source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("image{}.png", sequence))
    };

    let mut dest = root.join(&filename);
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
        dest = root.join(format!("{}_{}.{}", stem, counter, ext));
        counter += 1;
    }
    if counter > 1 {
        report.duplicates_renamed += 1;
    }

    if options.move_files {
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

/// Remove now-empty directories below `root`, deepest first
fn remove_empty_dirs(root: &Path) -> usize {
    let mut removed = 0;

    for entry in WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        // remove_dir refuses non-empty directories, which is exactly
        // the behavior wanted here
        if fs::remove_dir(entry.path()).is_ok() {
            removed += 1;
            info!("Removed empty directory {}", entry.path().display());
        }
    }

    removed
}

// -- Tests --
