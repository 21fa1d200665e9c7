//! Source file discovery.
//!
//! The scraped data tree is `<root>/<scrape_date>/<channel_name>/<file>`;
//! both discovery modes enumerate exactly that depth. Traversal order is
//! unspecified and downstream stages do not depend on it.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

/// Directory depth of a source file relative to the raw-data root.
pub const SOURCE_DEPTH: usize = 3;

/// Enumerate per-channel JSON message dumps under `root`.
///
/// A missing root is an empty result, not an error.
pub fn find_json_files(root: &Path) -> Vec<PathBuf> {
    files_with_extension(root, "json")
}

/// Enumerate scraped JPEG images under `root`.
pub fn find_image_files(root: &Path) -> Vec<PathBuf> {
    files_with_extension(root, "jpg")
}

fn files_with_extension(root: &Path, ext: &str) -> Vec<PathBuf> {
    if !root.is_dir() {
        debug!("Raw data root {} does not exist", root.display());
        return Vec::new();
    }

    let files: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(SOURCE_DEPTH)
        .max_depth(SOURCE_DEPTH)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(ext))
                .unwrap_or(false)
        })
        .map(walkdir::DirEntry::into_path)
        .collect();

    info!(
        "Found {} .{} files under {}",
        files.len(),
        ext,
        root.display()
    );
    files
}
