use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::{ImageFile, ImageFormat};

/// Discover sortable PNG files in a source directory.
///
/// With `preserve_structure` the walk recurses and records each file's
/// subdirectory relative to the root; otherwise only the top level is
/// scanned, matching how drop-folders of fresh generations are used.
pub fn find_png_files(directory: &Path, preserve_structure: bool) -> Result<Vec<ImageFile>> {
    let max_depth = if preserve_structure { usize::MAX } else { 1 };
    discover_images(directory, max_depth, |format| format.carries_metadata())
}

/// Discover all supported images under a directory, up to `max_depth`
pub fn find_image_files(directory: &Path, max_depth: Option<usize>) -> Result<Vec<ImageFile>> {
    discover_images(directory, max_depth.unwrap_or(usize::MAX), |format| {
        format.is_supported()
    })
}

fn discover_images(
    directory: &Path,
    max_depth: usize,
    wanted: impl Fn(&ImageFormat) -> bool,
) -> Result<Vec<ImageFile>> {
    if !directory.exists() {
        return Err(Error::DirectoryNotFound(directory.to_path_buf()));
    }

    let mut image_files = Vec::new();

    for entry in WalkDir::new(directory)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();

        let Some(format) = get_image_format(path) else {
            continue;
        };
        if !wanted(&format) {
            continue;
        }

        match get_file_metadata(path) {
            Ok((size, last_modified)) => {
                image_files.push(ImageFile {
                    path: path.to_path_buf(),
                    rel_dir: rel_dir_of(path, directory),
                    size,
                    last_modified,
                    format,
                });
            }
            Err(e) => {
                // Log error but continue with other files
                log::warn!("Error reading metadata for {}: {}", path.display(), e);
            }
        }
    }

    Ok(image_files)
}

/// Subdirectory of `path` relative to `root`, empty for root-level files
fn rel_dir_of(path: &Path, root: &Path) -> PathBuf {
    path.parent()
        .and_then(|parent| parent.strip_prefix(root).ok())
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Get image format from file extension
fn get_image_format(path: &Path) -> Option<ImageFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(ImageFormat::from_extension)
}

/// Get file metadata
fn get_file_metadata(path: &Path) -> io::Result<(u64, std::time::SystemTime)> {
    let metadata = fs::metadata(path)?;
    Ok((metadata.len(), metadata.modified()?))
}

/// Returns if the given path has a supported image extension
pub fn is_image_path(path: &Path) -> bool {
    match get_image_format(path) {
        Some(format) => format.is_supported(),
        None => false,
    }
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn create_test_image(dir: &Path, name: &str, ext: &str) -> PathBuf {
        let file_path = dir.join(format!("{}.{}", name, ext));
        let mut file = File::create(&file_path).unwrap();
        // Write some dummy data to simulate an image
        file.write_all(b"DUMMY IMAGE DATA").unwrap();
        file_path
    }

    fn setup_test_directory() -> (tempfile::TempDir, Vec<PathBuf>) {
        let dir = tempdir().unwrap();

        let subdir_path = dir.path().join("subdir");
        fs::create_dir(&subdir_path).unwrap();

        let files = vec![
            create_test_image(dir.path(), "image1", "png"),
            create_test_image(dir.path(), "image2", "png"),
            create_test_image(dir.path(), "photo", "jpg"),
            create_test_image(&subdir_path, "nested1", "png"),
        ];

        let non_image_path = dir.path().join("notes.txt");
        let mut file = File::create(&non_image_path).unwrap();
        file.write_all(b"NOT AN IMAGE").unwrap();

        (dir, files)
    }

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("test.png")));
        assert!(is_image_path(Path::new("test.jpg")));
        assert!(is_image_path(Path::new("test.webp")));
        assert!(!is_image_path(Path::new("test.txt")));
        assert!(!is_image_path(Path::new("test")));
    }

    #[test]
    fn test_find_png_files_top_level_only() {
        let (dir, _) = setup_test_directory();

        let discovered = find_png_files(dir.path(), false).unwrap();

        // Only root-level PNGs: image1.png, image2.png
        assert_eq!(discovered.len(), 2);
        for file in &discovered {
            assert_eq!(file.format, ImageFormat::Png);
            assert_eq!(file.rel_dir, PathBuf::new());
        }
    }

    #[test]
    fn test_find_png_files_preserving_structure() {
        let (dir, _) = setup_test_directory();

        let discovered = find_png_files(dir.path(), true).unwrap();

        assert_eq!(discovered.len(), 3);
        let nested = discovered
            .iter()
            .find(|f| f.path.file_name().unwrap() == "nested1.png")
            .unwrap();
        assert_eq!(nested.rel_dir, PathBuf::from("subdir"));
    }

    #[test]
    fn test_find_image_files_includes_all_formats() {
        let (dir, _) = setup_test_directory();

        let discovered = find_image_files(dir.path(), None).unwrap();
        assert_eq!(discovered.len(), 4);
    }

    #[test]
    fn test_nonexistent_directory() {
        let result = find_png_files(Path::new("/path/that/does/not/exist"), false);
        assert!(matches!(result, Err(Error::DirectoryNotFound(_))));
    }
}
