//! Segment Registry
//!
//! In-memory catalog of segments, ordered by ascending id. The last
//! segment is the active one and the only one ever appended to.

use std::fs;
use std::path::Path;

use crate::error::{Result, SegKvError};

use super::{is_segment_file, parse_segment_id, HEADER_SIZE};

/// Tracking info for one segment log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Monotonically increasing id; higher is newer
    pub id: u64,
    /// Record bytes written to this segment so far (drives rotation)
    pub byte_length: u64,
}

/// Ordered set of known segments
#[derive(Debug, Default)]
pub struct SegmentRegistry {
    /// Ascending by id; never empty once the manager has opened
    segments: Vec<Segment>,
}

impl SegmentRegistry {
    /// Rebuild the registry from the segment files found in `dir`
    ///
    /// `byte_length` is taken from the file size; callers repair the active
    /// segment's tail afterwards and correct it with [`Self::set_active_length`].
    pub fn discover(dir: &Path) -> Result<Self> {
        let mut segments = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !is_segment_file(name) || !entry.file_type()?.is_file() {
                continue;
            }

            match parse_segment_id(name) {
                Some(id) => {
                    let file_len = entry.metadata()?.len();
                    segments.push(Segment {
                        id,
                        byte_length: file_len.saturating_sub(HEADER_SIZE),
                    });
                }
                None => tracing::warn!("Ignoring segment file with unparsable id: {}", name),
            }
        }

        segments.sort_by_key(|s| s.id);
        Ok(Self { segments })
    }

    /// All segments, oldest first
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment ids, oldest first
    pub fn ids(&self) -> Vec<u64> {
        self.segments.iter().map(|s| s.id).collect()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segment currently receiving writes
    pub fn active(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Id the next rotation will use
    pub fn next_id(&self) -> u64 {
        self.active().map(|s| s.id + 1).unwrap_or(0)
    }

    /// Add record bytes to the active segment, returning its new length
    pub fn record_append(&mut self, bytes: u64) -> Result<u64> {
        let active = self
            .segments
            .last_mut()
            .ok_or_else(|| SegKvError::Corruption("no active segment".to_string()))?;
        active.byte_length += bytes;
        Ok(active.byte_length)
    }

    /// Overwrite the active segment's length (after tail repair)
    pub fn set_active_length(&mut self, byte_length: u64) {
        if let Some(active) = self.segments.last_mut() {
            active.byte_length = byte_length;
        }
    }

    /// Register a freshly created segment as the new active one
    ///
    /// The id must be greater than every existing id.
    pub fn push(&mut self, segment: Segment) -> Result<()> {
        if let Some(active) = self.active() {
            if segment.id <= active.id {
                return Err(SegKvError::Corruption(format!(
                    "segment id {} is not newer than active segment {}",
                    segment.id, active.id
                )));
            }
        }
        self.segments.push(segment);
        Ok(())
    }

    /// Replace every segment with a single one (after compaction)
    pub fn reset_to(&mut self, segment: Segment) {
        self.segments.clear();
        self.segments.push(segment);
    }
}
