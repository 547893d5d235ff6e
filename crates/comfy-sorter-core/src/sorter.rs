//! Placement of classified files into their group folders.
//!
//! Consumes a [`BatchOutcome`] and performs the actual folder creation
//! and move/copy work, with filename-conflict resolution and optional
//! sidecar metadata files. A failing file is logged and skipped; it
//! never aborts the rest of the batch.

use log::{error, info};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::BatchOutcome;
use crate::config::Config;
use crate::error::Result;

/// Statistics for one sorting pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortReport {
    pub total_images: usize,
    pub sorted_images: usize,
    pub unknown_checkpoint: usize,
    pub extraction_failed: usize,
    pub folders_created: usize,
    pub duplicates_handled: usize,
    pub failed_operations: usize,
}

/// Extra per-file context carried from the classification pass
#[derive(Debug, Default)]
pub struct FileDetails {
    /// Source-relative subdirectory, when structure is preserved
    pub rel_dirs: HashMap<PathBuf, PathBuf>,

    /// Pre-rendered sidecar report text per source path
    pub sidecars: HashMap<PathBuf, String>,
}

/// Sort grouped files into per-group folders under `output_dir`
pub fn sort_groups(
    outcome: &BatchOutcome,
    output_dir: &Path,
    config: &Config,
    details: &FileDetails,
) -> Result<SortReport> {
    let mut report = SortReport {
        total_images: outcome.counters.total,
        unknown_checkpoint: outcome.counters.unknown_checkpoint,
        extraction_failed: outcome.counters.extraction_failed,
        ..SortReport::default()
    };

    fs::create_dir_all(output_dir)?;

    let mut rename_counter = 0usize;

    for (group_name, files) in &outcome.groups {
        let group_folder = output_dir.join(group_name);
        fs::create_dir_all(&group_folder)?;
        info!("Created group folder: {}", group_folder.display());
        report.folders_created += 1;

        for source in files {
            rename_counter += 1;
            match place_file(source, &group_folder, config, details, rename_counter, &mut report) {
                Ok(dest) => {
                    report.sorted_images += 1;
                    info!(
                        "{} {} -> {}",
                        if config.move_files { "MOVE" } else { "COPY" },
                        source.display(),
                        dest.display()
                    );
                }
                Err(e) => {
                    report.failed_operations += 1;
                    error!("Failed to sort {}: {}", source.display(), e);
                }
            }
        }
    }

    Ok(report)
}

fn place_file(
    source: &Path,
    group_folder: &Path,
    config: &Config,
    details: &FileDetails,
    sequence: usize,
    report: &mut SortReport,
) -> Result<PathBuf> {
    let filename = if config.rename_files && !config.user_prefix.is_empty() {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");
        format!("{}_img{}.{}", config.user_prefix, sequence, ext)
    } else {
        source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("image{}.png", sequence))
    };

    let dest_folder = match details.rel_dirs.get(source) {
        Some(rel) if config.preserve_structure && !rel.as_os_str().is_empty() => {
            let folder = group_folder.join(rel);
            fs::create_dir_all(&folder)?;
            folder
        }
        _ => group_folder.to_path_buf(),
    };

    let dest = resolve_filename_conflict(dest_folder.join(filename), report);

    if config.move_files {
        move_file(source, &dest)?;
    } else {
        fs::copy(source, &dest)?;
    }

    if config.write_sidecars {
        if let Some(text) = details.sidecars.get(source) {
            write_sidecar(&dest, text);
        }
    }

    Ok(dest)
}

/// Move a file, falling back to copy-and-delete across filesystems
fn move_file(source: &Path, dest: &Path) -> std::io::Result<()> {
    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(source, dest)?;
            fs::remove_file(source)
        }
    }
}

/// Resolve filename conflicts by suffixing `_1`, `_2`, ...
fn resolve_filename_conflict(dest: PathBuf, report: &mut SortReport) -> PathBuf {
    if !dest.exists() {
        return dest;
    }

    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = dest
        .extension()
        .map(|e| e.to_string_lossy().into_owned());
    let parent = dest.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = match &ext {
            Some(ext) => parent.join(format!("{}_{}.{}", stem, counter, ext)),
            None => parent.join(format!("{}_{}", stem, counter)),
        };
        if !candidate.exists() {
            report.duplicates_handled += 1;
            return candidate;
        }
        counter += 1;
    }
}

/// Write the metadata report next to the sorted image
fn write_sidecar(image_path: &Path, text: &str) {
    let sidecar_path = image_path.with_extension("txt");
    if let Err(e) = fs::write(&sidecar_path, text) {
        error!(
            "Failed to create metadata file {}: {}",
            sidecar_path.display(),
            e
        );
    }
}

// -- Tests --
