//! Compaction

use std::fs;

use segkv::manager::{COMPACT_PENDING_FILENAME, COMPACT_TMP_FILENAME};
use segkv::storage::{
    parse_segment_id, record_len, segment_path, SegmentReader, HEAP_TMP_FILENAME,
};
use segkv::{CompactionStats, Config, SegmentManager};

use crate::{open, setup_temp_dir, two_record_config};

fn segment_files(dir: &std::path::Path) -> Vec<u64> {
    let mut ids: Vec<u64> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| parse_segment_id(e.unwrap().file_name().to_str()?))
        .collect();
    ids.sort();
    ids
}

#[test]
fn test_compaction_merges_into_single_segment() {
    let (_temp, dir) = setup_temp_dir();
    let manager = open(two_record_config(&dir));

    manager.write("a", "1").unwrap();
    manager.write("b", "2").unwrap();
    manager.write("c", "3").unwrap();
    assert_eq!(manager.segment_count(), 2);
    assert_eq!(manager.read("a").unwrap(), Some("1".to_string()));

    let stats = manager.compact().unwrap();

    assert_eq!(stats.segments_before, 2);
    assert_eq!(stats.keys_retained, 3);
    assert_eq!(manager.segment_count(), 1);
    assert_eq!(manager.active_segment().unwrap().id, 0);
    assert_eq!(segment_files(&dir), vec![0]);
    assert_eq!(manager.read("b").unwrap(), Some("2".to_string()));

    // One record per key, offsets into the rewritten heap
    let records: Vec<(String, u64)> = SegmentReader::open(&segment_path(&dir, 0))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(
        records,
        vec![
            ("a".to_string(), 0),
            ("b".to_string(), 9),
            ("c".to_string(), 18)
        ]
    );
}

#[test]
fn test_compaction_keeps_latest_values() {
    let (_temp, dir) = setup_temp_dir();
    let mut config = two_record_config(&dir);
    config.cache_capacity = 0;
    let manager = open(config);

    for round in 0..5 {
        for key in ["x", "y", "z"] {
            manager.write(key, &format!("{}-{}", key, round)).unwrap();
        }
    }
    manager.write("e", "").unwrap();

    manager.compact().unwrap();

    assert_eq!(manager.read("x").unwrap(), Some("x-4".to_string()));
    assert_eq!(manager.read("y").unwrap(), Some("y-4".to_string()));
    assert_eq!(manager.read("z").unwrap(), Some("z-4".to_string()));
    assert_eq!(manager.read("e").unwrap(), Some(String::new()));
    assert_eq!(manager.read("w").unwrap(), None);
}

#[test]
fn test_compaction_shrinks_heap() {
    let (_temp, dir) = setup_temp_dir();
    let manager = open(two_record_config(&dir));

    for i in 0..50 {
        manager.write("k", &format!("value-{:04}", i)).unwrap();
    }
    let before = manager.heap_len();

    let stats = manager.compact().unwrap();

    assert_eq!(stats.heap_bytes_before, before);
    assert_eq!(stats.heap_bytes_after, 8 + 10);
    assert_eq!(manager.heap_len(), 8 + 10);
    assert_eq!(manager.read("k").unwrap(), Some("value-0049".to_string()));
}

#[test]
fn test_compaction_leaves_no_temporaries() {
    let (_temp, dir) = setup_temp_dir();
    let manager = open(two_record_config(&dir));
    for key in ["a", "b", "c", "d"] {
        manager.write(key, key).unwrap();
    }

    manager.compact().unwrap();

    for name in [HEAP_TMP_FILENAME, COMPACT_TMP_FILENAME, COMPACT_PENDING_FILENAME] {
        assert!(!dir.join(name).exists(), "{} left behind", name);
    }
}

#[test]
fn test_writes_continue_after_compaction() {
    let (_temp, dir) = setup_temp_dir();
    let manager = open(two_record_config(&dir));
    for key in ["a", "b", "c", "d", "e"] {
        manager.write(key, "old").unwrap();
    }
    manager.compact().unwrap();

    manager.write("a", "new").unwrap();
    manager.write("f", "fresh").unwrap();

    assert_eq!(manager.read("a").unwrap(), Some("new".to_string()));
    assert_eq!(manager.read("f").unwrap(), Some("fresh".to_string()));
    assert_eq!(manager.read("e").unwrap(), Some("old".to_string()));

    // New segments continue from the merged one
    let ids: Vec<u64> = manager.segments().iter().map(|s| s.id).collect();
    assert_eq!(ids[0], 0);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    drop(manager);
    let manager = open(two_record_config(&dir));
    assert_eq!(manager.read("a").unwrap(), Some("new".to_string()));
    assert_eq!(manager.read("c").unwrap(), Some("old".to_string()));
}

#[test]
fn test_compaction_of_empty_store() {
    let (_temp, dir) = setup_temp_dir();
    let manager = open(two_record_config(&dir));

    let stats = manager.compact().unwrap();

    assert_eq!(stats.keys_retained, 0);
    assert_eq!(stats.heap_bytes_after, 0);
    assert_eq!(manager.segment_count(), 1);
    assert_eq!(manager.active_segment().unwrap().byte_length, 0);

    manager.write("a", "1").unwrap();
    assert_eq!(manager.read("a").unwrap(), Some("1".to_string()));
}

#[test]
fn test_maybe_compact_respects_trigger() {
    let (_temp, dir) = setup_temp_dir();
    let config = Config::builder()
        .data_dir(&dir)
        .segment_size_limit(2 * record_len(1))
        .compaction_trigger(2)
        .build();
    let manager = SegmentManager::open(config).unwrap();

    manager.write("a", "1").unwrap();
    manager.write("b", "2").unwrap();
    manager.write("c", "3").unwrap();
    assert_eq!(manager.segment_count(), 2);
    assert_eq!(manager.maybe_compact().unwrap(), None);

    manager.write("d", "4").unwrap();
    manager.write("e", "5").unwrap();
    assert_eq!(manager.segment_count(), 3);

    let stats = manager.maybe_compact().unwrap();
    assert_eq!(
        stats,
        Some(CompactionStats {
            segments_before: 3,
            keys_retained: 5,
            heap_bytes_before: 5 * 9,
            heap_bytes_after: 5 * 9,
        })
    );
    assert_eq!(manager.segment_count(), 1);
    assert_eq!(manager.read("b").unwrap(), Some("2".to_string()));
}

#[test]
fn test_compaction_drops_unreadable_values() {
    let (_temp, dir) = setup_temp_dir();
    let mut config = two_record_config(&dir);
    config.cache_capacity = 0;
    let manager = open(config);

    manager.write("a", "1").unwrap();
    manager.write("b", "this value will be cut off").unwrap();

    // Cut the heap inside b's entry
    let heap = fs::OpenOptions::new()
        .write(true)
        .open(dir.join(segkv::storage::HEAP_FILENAME))
        .unwrap();
    heap.set_len(9 + 12).unwrap();
    drop(heap);

    let stats = manager.compact().unwrap();

    assert_eq!(stats.keys_retained, 1);
    assert_eq!(manager.read("a").unwrap(), Some("1".to_string()));
    assert_eq!(manager.read("b").unwrap(), None);
}

/// Leave a..f in segments 10-13 with a directory squatting on segment-0.log
fn block_segment_zero(dir: &std::path::Path) {
    {
        let manager = open(two_record_config(dir));
        for (i, key) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            manager.write(key, &i.to_string()).unwrap();
        }
        assert_eq!(manager.segment_count(), 4);
    }
    for id in 0..4 {
        fs::rename(segment_path(dir, id), segment_path(dir, id + 10)).unwrap();
    }
    fs::create_dir(segment_path(dir, 0)).unwrap();
}

#[test]
fn test_failed_swap_blocks_until_retried() {
    let (_temp, dir) = setup_temp_dir();
    block_segment_zero(&dir);
    let manager = open(two_record_config(&dir));
    assert_eq!(segment_files(&dir), vec![0, 10, 11, 12, 13]);

    // The merged log cannot be renamed onto a directory
    assert!(manager.compact().is_err());
    assert!(dir.join(COMPACT_PENDING_FILENAME).exists());

    // Nothing runs against a half-swapped directory
    assert!(manager.read("c").is_err());
    assert!(manager.write("g", "6").is_err());
    assert!(manager.sync().is_err());

    fs::remove_dir(segment_path(&dir, 0)).unwrap();

    // The next operation finishes the swap
    assert_eq!(manager.read("c").unwrap(), Some("2".to_string()));
    assert!(!dir.join(COMPACT_PENDING_FILENAME).exists());
    assert_eq!(segment_files(&dir), vec![0]);
    assert_eq!(manager.segment_count(), 1);

    manager.write("g", "6").unwrap();
    assert_eq!(manager.read("g").unwrap(), Some("6".to_string()));
    assert_eq!(manager.read("f").unwrap(), Some("5".to_string()));

    drop(manager);
    let manager = open(two_record_config(&dir));
    for (i, key) in ["a", "b", "c", "d", "e", "f", "g"].iter().enumerate() {
        assert_eq!(manager.read(key).unwrap(), Some(i.to_string()));
    }
}

#[test]
fn test_failed_swap_is_finished_on_reopen() {
    let (_temp, dir) = setup_temp_dir();
    block_segment_zero(&dir);
    {
        let manager = open(two_record_config(&dir));
        assert!(manager.compact().is_err());
    }

    fs::remove_dir(segment_path(&dir, 0)).unwrap();

    let manager = open(two_record_config(&dir));
    assert_eq!(manager.segment_count(), 1);
    assert_eq!(manager.read("a").unwrap(), Some("0".to_string()));
    assert_eq!(manager.read("e").unwrap(), Some("4".to_string()));
}

#[test]
fn test_directory_named_like_segment_is_ignored() {
    let (_temp, dir) = setup_temp_dir();
    let manager = open(two_record_config(&dir));
    for key in ["a", "b", "c", "d", "e"] {
        manager.write(key, key).unwrap();
    }
    fs::create_dir(segment_path(&dir, 99)).unwrap();

    manager.compact().unwrap();

    assert!(segment_path(&dir, 99).is_dir());
    assert_eq!(manager.segment_count(), 1);
    assert_eq!(manager.read("d").unwrap(), Some("d".to_string()));

    drop(manager);
    let manager = open(two_record_config(&dir));
    assert_eq!(manager.segment_count(), 1);
    assert_eq!(manager.read("e").unwrap(), Some("e".to_string()));
}
