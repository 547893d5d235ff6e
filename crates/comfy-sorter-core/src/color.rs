//! Sorting images by dominant color.
//!
//! Each image is downsampled, its most frequent (noise-grouped) pixel
//! color is taken as dominant, and that color is snapped to the nearest
//! of a fixed set of named categories by RGB distance.

use image::imageops::FilterType;
use log::{error, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery::find_image_files;
use crate::error::Result;

/// Named color categories with representative RGB anchors
const COLOR_CATEGORIES: &[(&str, [(u8, u8, u8); 4])] = &[
    ("Red", [(255, 0, 0), (220, 20, 60), (178, 34, 34), (139, 0, 0)]),
    ("Orange", [(255, 165, 0), (255, 140, 0), (255, 69, 0), (255, 99, 71)]),
    ("Yellow", [(255, 255, 0), (255, 215, 0), (218, 165, 32), (184, 134, 11)]),
    ("Green", [(0, 255, 0), (34, 139, 34), (0, 128, 0), (46, 125, 50)]),
    ("Blue", [(0, 0, 255), (30, 144, 255), (0, 191, 255), (70, 130, 180)]),
    ("Purple", [(128, 0, 128), (75, 0, 130), (148, 0, 211), (138, 43, 226)]),
    ("Pink", [(255, 192, 203), (255, 20, 147), (219, 112, 147), (199, 21, 133)]),
    ("Brown", [(165, 42, 42), (139, 69, 19), (160, 82, 45), (210, 180, 140)]),
    ("Black", [(0, 0, 0), (25, 25, 25), (50, 50, 50), (75, 75, 75)]),
    ("White", [(255, 255, 255), (248, 248, 255), (245, 245, 245), (220, 220, 220)]),
    ("Gray", [(128, 128, 128), (105, 105, 105), (169, 169, 169), (192, 192, 192)]),
];

/// Category for images whose color could not be determined
pub const UNKNOWN_COLOR: &str = "Unknown";

/// Analysis size; dominance is stable well below full resolution
const ANALYSIS_SIZE: u32 = 150;

/// Options for one color sorting run
#[derive(Debug, Clone)]
pub struct ColorSortOptions {
    /// Move files instead of copying them
    pub move_files: bool,

    /// Skip pixels darker than this brightness fraction (0.0 - 1.0)
    pub dark_threshold: f32,

    /// Rename sorted files as `{category}_img{n}`
    pub rename_files: bool,

    /// Prefix for renamed files
    pub user_prefix: String,
}

impl Default for ColorSortOptions {
    fn default() -> Self {
        Self {
            move_files: false,
            dark_threshold: 0.1,
            rename_files: false,
            user_prefix: String::new(),
        }
    }
}

/// Statistics for one color sorting run
#[derive(Debug, Clone, Default)]
pub struct ColorSortReport {
    pub total_images: usize,
    pub sorted: usize,
    pub failed: usize,

    /// Images per category name
    pub distribution: BTreeMap<String, usize>,
}

/// Most frequent bright pixel color of an image, grouped to reduce noise.
///
/// Returns None when the image cannot be decoded or every pixel falls
/// under the darkness threshold.
pub fn dominant_color(path: &Path, dark_threshold: f32) -> Option<(u8, u8, u8)> {
    let img = match image::open(path) {
        Ok(img) => img,
        Err(e) => {
            warn!("Cannot decode {} for color analysis: {}", path.display(), e);
            return None;
        }
    };

    let small = img
        .resize_exact(ANALYSIS_SIZE, ANALYSIS_SIZE, FilterType::Nearest)
        .to_rgb8();

    let mut counts: HashMap<(u8, u8, u8), u32> = HashMap::new();
    for pixel in small.pixels() {
        let [r, g, b] = pixel.0;

        // Brightness is the HSV value component
        let value = r.max(g).max(b) as f32 / 255.0;
        if value < dark_threshold {
            continue;
        }

        let grouped = (r / 10 * 10, g / 10 * 10, b / 10 * 10);
        *counts.entry(grouped).or_default() += 1;
    }

    counts
        .into_iter()
        .max_by_key(|&(color, count)| (count, color))
        .map(|(color, _)| color)
}

/// Nearest named category for a dominant color, by Euclidean RGB distance
pub fn categorize_color(color: Option<(u8, u8, u8)>) -> &'static str {
    let Some((r, g, b)) = color else {
        return UNKNOWN_COLOR;
    };

    let mut best = UNKNOWN_COLOR;
    let mut best_distance = f64::INFINITY;

    for (name, anchors) in COLOR_CATEGORIES {
        for &(ar, ag, ab) in anchors {
            let dr = r as f64 - ar as f64;
            let dg = g as f64 - ag as f64;
            let db = b as f64 - ab as f64;
            let distance = (dr * dr + dg * dg + db * db).sqrt();
            if distance < best_distance {
                best_distance = distance;
                best = name;
            }
        }
    }

    best
}

/// Sort a directory of images into per-color folders under `output_dir`
pub fn sort_by_color(
    source_dir: &Path,
    output_dir: &Path,
    options: &ColorSortOptions,
) -> Result<ColorSortReport> {
    let files = find_image_files(source_dir, Some(1))?;
    let mut report = ColorSortReport {
        total_images: files.len(),
        ..ColorSortReport::default()
    };

    info!("Analyzing colors of {} images", files.len());
    fs::create_dir_all(output_dir)?;

    let mut rename_counters: BTreeMap<&'static str, usize> = BTreeMap::new();

    for file in &files {
        let category = categorize_color(dominant_color(&file.path, options.dark_threshold));
        *report.distribution.entry(category.to_string()).or_default() += 1;

        let category_dir = output_dir.join(category);

        let counter = rename_counters.entry(category).or_insert(0);
        *counter += 1;

        match place_in_category(&file.path, &category_dir, category, *counter, options) {
            Ok(dest) => {
                report.sorted += 1;
                info!(
                    "{} [{}] -> {}",
                    file.path.display(),
                    category,
                    dest.display()
                );
            }
            Err(e) => {
                report.failed += 1;
                error!("Failed to sort {}: {}", file.path.display(), e);
            }
        }
    }

    Ok(report)
}

fn place_in_category(
    source: &Path,
    category_dir: &Path,
    category: &str,
    sequence: usize,
    options: &ColorSortOptions,
) -> Result<PathBuf> {
    fs::create_dir_all(category_dir)?;

    let filename = if options.rename_files {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");
        if options.user_prefix.is_empty() {
            format!("{}_img{}.{}", category.to_lowercase(), sequence, ext)
        } else {
            format!(
                "{}_{}_img{}.{}",
                options.user_prefix,
                category.to_lowercase(),
                sequence,
                ext
            )
        }
    } else {
        source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("image{}.png", sequence))
    };

    let mut dest = category_dir.join(&filename);
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
        dest = category_dir.join(format!("{}_{}.{}", stem, counter, ext));
        counter += 1;
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

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn solid_png(dir: &Path, name: &str, rgb: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        let img = RgbImage::from_pixel(16, 16, Rgb(rgb));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_categorize_exact_anchors() {
        assert_eq!(categorize_color(Some((255, 0, 0))), "Red");
        assert_eq!(categorize_color(Some((0, 0, 255))), "Blue");
        assert_eq!(categorize_color(Some((255, 255, 255))), "White");
        assert_eq!(categorize_color(Some((0, 0, 0))), "Black");
    }

    #[test]
    fn test_categorize_near_misses() {
        assert_eq!(categorize_color(Some((250, 10, 10))), "Red");
        assert_eq!(categorize_color(Some((10, 250, 10))), "Green");
    }

    #[test]
    fn test_categorize_none_is_unknown() {
        assert_eq!(categorize_color(None), UNKNOWN_COLOR);
    }

    #[test]
    fn test_dominant_color_of_solid_image() {
        let dir = tempdir().unwrap();
        let path = solid_png(dir.path(), "red.png", [255, 0, 0]);

        // Grouped to the nearest multiple of 10
        assert_eq!(dominant_color(&path, 0.1), Some((250, 0, 0)));
    }

    #[test]
    fn test_all_dark_pixels_yield_none() {
        let dir = tempdir().unwrap();
        let path = solid_png(dir.path(), "dark.png", [5, 5, 5]);

        assert_eq!(dominant_color(&path, 0.1), None);
    }

    #[test]
    fn test_undecodable_file_yields_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not_an_image.png");
        std::fs::write(&path, b"junk").unwrap();

        assert_eq!(dominant_color(&path, 0.1), None);
    }

    #[test]
    fn test_sort_by_color_buckets_images() {
        let source = tempdir().unwrap();
        let output = tempdir().unwrap();

        solid_png(source.path(), "r.png", [255, 0, 0]);
        solid_png(source.path(), "b.png", [0, 0, 255]);

        let report =
            sort_by_color(source.path(), output.path(), &ColorSortOptions::default()).unwrap();

        assert_eq!(report.total_images, 2);
        assert_eq!(report.sorted, 2);
        assert_eq!(report.distribution["Red"], 1);
        assert_eq!(report.distribution["Blue"], 1);
        assert!(output.path().join("Red").join("r.png").exists());
        assert!(output.path().join("Blue").join("b.png").exists());
    }
}
