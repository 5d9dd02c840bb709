//! Read path: cache lookup, newest-wins segment scan and heap resolve.

use crate::error::{Result, SegKvError};
use crate::storage::{segment_path, SegmentReader, SegmentRegistry};

use super::SegmentManager;

impl SegmentManager {
    /// Look up the current value for `key`
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found (the value may be empty)
    /// - `Ok(None)`: key was never written
    ///
    /// Search order:
    /// 1. Cache
    /// 2. Every segment, oldest to newest; the last matching record wins
    /// 3. Heap resolve of the winning offset, which then fills the cache
    ///
    /// # Errors
    ///
    /// `Io` on file-system failure, `CorruptHeap` if the winning offset
    /// points past the end of the heap. Corrupt segment records are logged
    /// and skipped. While a failed compaction swap cannot be finished, the
    /// swap's error is returned.
    pub fn read(&self, key: &str) -> Result<Option<String>> {
        if self.state.read().swap_pending {
            let mut state = self.state.write();
            self.finish_pending_swap(&mut state)?;
        }

        let state = self.state.read();
        if state.swap_pending {
            // Another pass failed its swap between the two locks
            return Err(SegKvError::Corruption(
                "compaction swap is incomplete".to_string(),
            ));
        }

        if let Some(value) = state.cache.lock().get(key) {
            return Ok(Some(value));
        }

        let Some(offset) = self.find_offset(&state.registry, key)? else {
            return Ok(None);
        };

        let bytes = state.heap.resolve(offset)?;
        let value = String::from_utf8(bytes).map_err(|_| {
            SegKvError::Corruption(format!("heap entry at offset {} is not valid UTF-8", offset))
        })?;

        state.cache.lock().insert(key, &value);
        Ok(Some(value))
    }

    /// Offset of the newest record for `key` across all segments
    ///
    /// Segments are visited in ascending id order and every match overwrites
    /// the previous one, so the result is the last write. A segment with a
    /// bad header or a corrupt record is skipped from that point on; the
    /// scan carries on with the next segment.
    fn find_offset(&self, registry: &SegmentRegistry, key: &str) -> Result<Option<u64>> {
        let mut latest = None;

        for segment in registry.segments() {
            let path = segment_path(&self.data_dir, segment.id);
            let reader = match SegmentReader::open(&path) {
                Ok(reader) => reader,
                Err(e) if e.is_corruption() => {
                    tracing::warn!("Skipping segment {}: {}", segment.id, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            for record in reader {
                match record {
                    Ok((record_key, offset)) => {
                        if record_key == key {
                            latest = Some(offset);
                        }
                    }
                    Err(e) if e.is_corruption() => {
                        tracing::warn!("Skipping rest of segment {}: {}", segment.id, e);
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(latest)
    }
}
