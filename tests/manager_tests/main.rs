//! Tests for the segment manager: write/read paths, rotation, compaction,
//! startup recovery and concurrent access.

mod compaction_tests;

use std::path::{Path, PathBuf};

use segkv::storage::record_len;
use segkv::{Config, SegmentManager, SyncStrategy};
use tempfile::TempDir;

pub fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().to_path_buf();
    (temp, path)
}

/// Rotates after every second record with a one-byte key
pub fn two_record_config(dir: &Path) -> Config {
    Config::builder()
        .data_dir(dir)
        .segment_size_limit(2 * record_len(1))
        .sync_strategy(SyncStrategy::EveryWrite)
        .cache_capacity(16)
        .build()
}

pub fn open(config: Config) -> SegmentManager {
    SegmentManager::open(config).unwrap()
}
