//! Compaction: merges every segment into one and rewrites the heap so it
//! holds only the latest value of each key.
//!
//! ## Commit protocol
//!
//! ```text
//! heap.tmp     ← surviving values          (fsync)
//! compact.tmp  ← one record per key         (fsync)
//! compact.tmp  → compact.pending            ◀── commit point
//! heap.tmp     → heap.dat
//! rm segment-*.log
//! compact.pending → segment-0.log           (fsync dir)
//! ```
//!
//! Before the commit point a failure only leaves temporaries behind, which
//! are removed. After it, the swap is retried by the next operation under
//! the exclusive lock, or by startup recovery after a restart.

use std::collections::BTreeMap;
use std::fs;

use crate::error::Result;
use crate::storage::{
    segment_path, sync_dir, write_segment_file, Segment, SegmentReader, SegmentWriter,
};

use super::recovery::finish_compaction_swap;
use super::{SegmentManager, State, COMPACT_PENDING_FILENAME, COMPACT_TMP_FILENAME};

/// Outcome of one compaction pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    /// Segments merged by this pass
    pub segments_before: usize,
    /// Distinct keys written to the merged segment
    pub keys_retained: usize,
    pub heap_bytes_before: u64,
    pub heap_bytes_after: u64,
}

impl SegmentManager {
    /// Run a compaction pass if the segment count exceeds the trigger
    ///
    /// Returns `None` when there was nothing to do.
    pub fn maybe_compact(&self) -> Result<Option<CompactionStats>> {
        let mut state = self.state.write();
        self.finish_pending_swap(&mut state)?;
        if state.registry.len() <= self.config.compaction_trigger {
            return Ok(None);
        }
        self.compact_locked(&mut state).map(Some)
    }

    /// Merge all segments into one and rewrite the heap
    ///
    /// Holds the exclusive lock for the whole pass: reads and writes wait
    /// until it is over. The cache is kept unless a key had to be dropped.
    ///
    /// # Errors
    ///
    /// Any I/O error aborts the pass. Failures before the commit point leave
    /// the previous heap and segments exactly as they were.
    pub fn compact(&self) -> Result<CompactionStats> {
        let mut state = self.state.write();
        self.finish_pending_swap(&mut state)?;
        self.compact_locked(&mut state)
    }

    /// Move a committed merged log into place if an earlier swap failed
    ///
    /// Called under the exclusive lock before anything touches segments.
    /// On failure the manager stays blocked and the next call retries;
    /// a restart finishes the swap through recovery instead.
    pub(crate) fn finish_pending_swap(&self, state: &mut State) -> Result<()> {
        if !state.swap_pending {
            return Ok(());
        }

        let pending_path = self.data_dir.join(COMPACT_PENDING_FILENAME);
        let result = if pending_path.exists() {
            finish_compaction_swap(&self.data_dir, &pending_path)
        } else {
            // Already renamed into place; only the directory sync failed
            sync_dir(&self.data_dir).map_err(Into::into)
        };
        if let Err(e) = result {
            tracing::error!("Compaction swap still incomplete: {}", e);
            return Err(e);
        }

        state.active.set_path(&segment_path(&self.data_dir, 0));
        state.swap_pending = false;
        Ok(())
    }

    fn compact_locked(&self, state: &mut State) -> Result<CompactionStats> {
        let segments_before = state.registry.len();
        let heap_bytes_before = state.heap.len();

        // Step 1: newest offset for every key (same rule as the read path)
        let mut latest: BTreeMap<String, u64> = BTreeMap::new();
        for segment in state.registry.segments() {
            let path = segment_path(&self.data_dir, segment.id);
            let reader = match SegmentReader::open(&path) {
                Ok(reader) => reader,
                Err(e) if e.is_corruption() => {
                    tracing::warn!("Compaction skipping segment {}: {}", segment.id, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            for record in reader {
                match record {
                    Ok((key, offset)) => {
                        latest.insert(key, offset);
                    }
                    Err(e) if e.is_corruption() => {
                        tracing::warn!("Compaction skipping rest of segment {}: {}", segment.id, e);
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        // Step 2: resolve values while the old heap is still in place
        let mut live: Vec<(String, Vec<u8>)> = Vec::with_capacity(latest.len());
        let mut dropped = 0usize;
        for (key, offset) in latest {
            match state.heap.resolve(offset) {
                Ok(value) => live.push((key, value)),
                Err(e) if e.is_corruption() => {
                    tracing::warn!("Compaction dropping unreadable key {:?}: {}", key, e);
                    dropped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        // Step 3: new heap into heap.tmp
        let (mut rewrite, offsets) = state
            .heap
            .rewrite(live.iter().map(|(_, value)| value.as_slice()))?;

        // Step 4: merged log into compact.tmp
        let tmp_path = self.data_dir.join(COMPACT_TMP_FILENAME);
        let records = live
            .iter()
            .map(|(key, _)| key.as_str())
            .zip(offsets.iter().copied());
        let merged_len = match write_segment_file(&tmp_path, records) {
            Ok(len) => len,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };

        // Step 5: commit point
        let pending_path = self.data_dir.join(COMPACT_PENDING_FILENAME);
        if let Err(e) = fs::rename(&tmp_path, &pending_path).and_then(|_| sync_dir(&self.data_dir))
        {
            let _ = fs::remove_file(&tmp_path);
            let _ = fs::remove_file(&pending_path);
            return Err(e.into());
        }

        // Opened before any rename so the swap below cannot fail halfway on it
        let writer = match SegmentWriter::open(&pending_path) {
            Ok(writer) => writer,
            Err(e) => {
                let _ = fs::remove_file(&pending_path);
                return Err(e);
            }
        };

        if let Err(e) = state.heap.install(&mut rewrite) {
            // Un-commit: the old heap and segments were never touched
            let _ = fs::remove_file(&pending_path);
            return Err(e);
        }
        let heap_bytes_after = state.heap.len();

        // Step 6: the new heap is live, so the in-memory view moves to the
        // merged log now. Until its file sits at segment-0.log nothing may
        // scan or append; `swap_pending` holds every operation back.
        state.registry.reset_to(Segment {
            id: 0,
            byte_length: merged_len,
        });
        state.active = writer;
        state.writes_since_sync = 0;
        state.swap_pending = true;
        if dropped > 0 {
            // A dropped key must not keep answering from the cache
            state.cache.lock().clear();
        }
        self.finish_pending_swap(state)?;

        let stats = CompactionStats {
            segments_before,
            keys_retained: live.len(),
            heap_bytes_before,
            heap_bytes_after,
        };

        tracing::info!(
            "Compacted {} segments into 1: {} keys, heap {} → {} bytes",
            stats.segments_before,
            stats.keys_retained,
            stats.heap_bytes_before,
            stats.heap_bytes_after
        );

        Ok(stats)
    }
}
