//! Write path: `write()`, input validation and segment rotation.

use crate::error::{Result, SegKvError};
use crate::storage::{segment_path, Segment, SegmentWriter, MAX_KEY_SIZE, MAX_VALUE_SIZE};

use super::{SegmentManager, State};

impl SegmentManager {
    /// Store `value` as the current value for `key`
    ///
    /// Steps (under the exclusive lock):
    /// 1. Append the value to the heap
    /// 2. Append `key → offset` to the active segment
    /// 3. Rotate if the active segment has reached the size limit
    /// 4. Update the cache
    ///
    /// Once steps 1-2 succeed the write is in the log; a rotation failure is
    /// logged and retried on the next write rather than reported.
    ///
    /// # Errors
    ///
    /// `InvalidKey` / `ValueTooLarge` for bad input, `Io` if the heap or the
    /// segment cannot be written.
    pub fn write(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        validate_value(value)?;

        let mut state = self.state.write();
        self.finish_pending_swap(&mut state)?;
        let sync_now = state.should_sync(self.config.sync_strategy);

        // Step 1: heap first, so the record never points at missing bytes
        let offset = state.heap.append(value.as_bytes())?;
        if sync_now {
            state.heap.sync()?;
        }

        // Step 2: index record
        let written = state.active.append_record(key, offset)?;
        if sync_now {
            state.active.sync()?;
        }
        let active_len = state.registry.record_append(written)?;

        // Step 3: rotation
        if active_len >= self.config.segment_size_limit {
            if let Err(e) = self.rotate(&mut state) {
                tracing::error!("Segment rotation failed, staying on current segment: {}", e);
            }
        }

        // Step 4: cache
        state.cache.lock().insert(key, value);

        Ok(())
    }

    /// Create the next segment on disk, then make it active
    ///
    /// The registry is only changed after the new file exists with its
    /// header synced, so a failure leaves the current segment active.
    fn rotate(&self, state: &mut State) -> Result<()> {
        // Everything in the outgoing segment must be durable before we leave it
        state.heap.sync()?;
        state.active.sync()?;
        state.writes_since_sync = 0;

        let id = state.registry.next_id();
        let writer = SegmentWriter::create(&segment_path(&self.data_dir, id))?;

        state.registry.push(Segment { id, byte_length: 0 })?;
        state.active = writer;

        tracing::debug!("Rotated to segment {} ({} segments)", id, state.registry.len());
        Ok(())
    }
}

/// Keys must be non-empty and at most `MAX_KEY_SIZE` bytes. Any byte,
/// including `:` and `\n`, is allowed: records are length-prefixed.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(SegKvError::InvalidKey("key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(SegKvError::InvalidKey(format!(
            "key is {} bytes (max {})",
            key.len(),
            MAX_KEY_SIZE
        )));
    }
    Ok(())
}

pub(crate) fn validate_value(value: &str) -> Result<()> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(SegKvError::ValueTooLarge {
            size: value.len(),
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(())
}
