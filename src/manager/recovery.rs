//! Startup recovery: finishing interrupted compactions, removing temporary
//! files and rebuilding the in-memory state from the data directory.

use std::fs;
use std::path::Path;

use parking_lot::Mutex;

use crate::cache::LruCache;
use crate::error::Result;
use crate::storage::{
    is_segment_file, repair_tail, segment_path, sync_dir, truncate_segment, Heap, Segment,
    SegmentReader, SegmentRegistry, SegmentWriter, HEADER_SIZE, HEAP_FILENAME, HEAP_TMP_FILENAME,
};

use super::{State, COMPACT_PENDING_FILENAME, COMPACT_TMP_FILENAME};

/// Build the manager state for `dir`
pub(super) fn load_state(dir: &Path, cache_capacity: usize) -> Result<State> {
    finish_interrupted_compaction(dir)?;
    cleanup_tmp_files(dir);

    let heap = Heap::open(dir)?;
    let mut registry = SegmentRegistry::discover(dir)?;

    let active = match registry.active().copied() {
        Some(segment) => {
            let path = segment_path(dir, segment.id);
            repair_tail(&path)?;
            let record_bytes = drop_dangling_records(&path, &heap)?;
            registry.set_active_length(record_bytes);
            SegmentWriter::open(&path)?
        }
        None => {
            let writer = SegmentWriter::create(&segment_path(dir, 0))?;
            registry.push(Segment {
                id: 0,
                byte_length: 0,
            })?;
            tracing::debug!("Created initial segment 0");
            writer
        }
    };

    Ok(State {
        registry,
        heap,
        active,
        writes_since_sync: 0,
        cache: Mutex::new(LruCache::new(cache_capacity)),
        swap_pending: false,
    })
}

/// Cut the active segment back to its last record with a complete value
///
/// With batched syncs the log can reach the disk ahead of the heap. Heap
/// offsets grow with log order, so everything from the first record whose
/// entry is missing onwards points past the heap. Returns the record bytes
/// that remain.
fn drop_dangling_records(path: &Path, heap: &Heap) -> Result<u64> {
    let mut reader = SegmentReader::open(path)?;
    let mut keep = reader.position();
    let mut dropped = 0usize;

    while let Some(record) = reader.next() {
        let (_, offset) = record?;
        if dropped == 0 && heap.contains_entry(offset)? {
            keep = reader.position();
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        tracing::warn!(
            "Dropping {} record(s) from {} whose values never reached the heap",
            dropped,
            path.display()
        );
        truncate_segment(path, keep)?;
    }

    Ok(keep.saturating_sub(HEADER_SIZE))
}

/// Remove every segment log and move the merged log into place as segment 0
///
/// Shared by a live compaction and by recovery. `compact.pending` is only
/// renamed away once every old segment is gone, so a failure part way
/// through is retried by the next operation or the next open.
pub(super) fn finish_compaction_swap(dir: &Path, pending: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        // Same rule as discovery: only regular files are segments
        if file_name.to_str().map(is_segment_file).unwrap_or(false)
            && entry.file_type()?.is_file()
        {
            fs::remove_file(entry.path())?;
        }
    }

    fs::rename(pending, segment_path(dir, 0))?;
    sync_dir(dir)?;
    Ok(())
}

/// Complete a compaction that crashed after its commit point
///
/// `compact.pending` exists only once both the merged heap and the merged
/// log are fully on disk. If `heap.tmp` is still around, the heap rename
/// never happened and is done now.
fn finish_interrupted_compaction(dir: &Path) -> Result<()> {
    let pending = dir.join(COMPACT_PENDING_FILENAME);
    if !pending.exists() {
        return Ok(());
    }

    tracing::info!("Completing interrupted compaction in {}", dir.display());

    let heap_tmp = dir.join(HEAP_TMP_FILENAME);
    if heap_tmp.exists() {
        fs::rename(&heap_tmp, dir.join(HEAP_FILENAME))?;
    }

    finish_compaction_swap(dir, &pending)
}

/// Remove temporaries left by a compaction that never reached its commit point
fn cleanup_tmp_files(dir: &Path) {
    for name in [HEAP_TMP_FILENAME, COMPACT_TMP_FILENAME] {
        let path = dir.join(name);
        if path.exists() {
            tracing::debug!("Removing stale {}", path.display());
            let _ = fs::remove_file(&path);
        }
    }
}
