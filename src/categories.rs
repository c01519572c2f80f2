//! Category folders and the identity of the images inside them.
//!
//! The image root holds one subdirectory per category. An image is identified
//! by its file stem, and belongs to the category named by its parent folder.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern, glob_with};

use crate::error::{AnnotatorError, Result};

/// Extensions shown in the image list, matched case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

/// Names of the immediate subdirectories of `root`, sorted.
pub fn list_categories(root: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(root).map_err(|e| AnnotatorError::io(root, e))?;
    let mut categories = vec![];
    for entry in entries {
        let entry = entry.map_err(|e| AnnotatorError::io(root, e))?;
        if entry.path().is_dir() {
            categories.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    categories.sort();
    Ok(categories)
}

/// Image files directly inside `dir`, sorted by path.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let meta = fs::metadata(dir).map_err(|e| AnnotatorError::io(dir, e))?;
    if !meta.is_dir() {
        return Err(AnnotatorError::NotADirectory(dir.to_path_buf()));
    }

    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::default()
    };
    let escaped = Pattern::escape(&dir.to_string_lossy());
    let mut images = vec![];
    for ext in IMAGE_EXTENSIONS {
        let pattern = format!("{escaped}/*.{ext}");
        for path in glob_with(&pattern, options)?.flatten() {
            if path.is_file() {
                images.push(path);
            }
        }
    }
    images.sort();
    images.dedup();
    Ok(images)
}

/// File name without its extension.
pub fn image_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Name of the folder the image sits in.
pub fn category_from_path(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
