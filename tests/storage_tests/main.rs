//! Storage layer tests: offset codec, value heap, segment logs, registry


use std::path::PathBuf;
use tempfile::TempDir;

pub fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}
