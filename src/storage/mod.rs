//! Storage Module
//!
//! On-disk structures of the store: the value heap, the segment logs that
//! index into it, and the in-memory registry of known segments.
//!
//! ## Responsibilities
//! - Append values to the heap and resolve them by offset
//! - Append `key → offset` records to the active segment
//! - Stream records back out of a segment in file order
//! - Track segment ids and sizes for rotation
//!
//! ## Heap Format
//! ```text
//! ┌──────────────┬─────────────────┬──────────────┬──────────────
//! │ Len: u64 LE  │  Value bytes    │ Len: u64 LE  │  Value ...
//! └──────────────┴─────────────────┴──────────────┴──────────────
//! ```
//!
//! ## Segment Log Format (V1)
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (6 bytes)                                        │
//! │   Magic: "SGLG" (4) | Version: u16 LE (2)               │
//! ├─────────────────────────────────────────────────────────┤
//! │ Records (variable)                                      │
//! │   [KeyLen: u64][Key][Offset: u64][CRC32: u32]           │
//! │   ... repeated, append-only ...                         │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod heap;
mod registry;
mod segment;

pub use heap::{Heap, HeapRewrite, HEAP_FILENAME, HEAP_TMP_FILENAME};
pub use registry::{Segment, SegmentRegistry};
pub use segment::{
    record_len, repair_tail, truncate_segment, write_segment_file, SegmentReader, SegmentWriter,
    HEADER_SIZE, MAGIC, VERSION,
};

use std::path::{Path, PathBuf};

/// Maximum allowed key size in bytes (64 KiB)
pub const MAX_KEY_SIZE: usize = 64 * 1024;

/// Maximum allowed value size in bytes (16 MiB)
pub const MAX_VALUE_SIZE: usize = 16 * 1024 * 1024;

const SEGMENT_PREFIX: &str = "segment-";
const SEGMENT_SUFFIX: &str = ".log";

/// Generate the file path for the segment with the given id
/// 7 → "{dir}/segment-7.log"
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}{}{}", SEGMENT_PREFIX, id, SEGMENT_SUFFIX))
}

/// Parse a segment id from a file name
/// "segment-42.log" → Some(42)
pub fn parse_segment_id(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?
        .parse()
        .ok()
}

/// True for names that look like segment logs, whether or not the id parses
pub(crate) fn is_segment_file(file_name: &str) -> bool {
    file_name.starts_with(SEGMENT_PREFIX) && file_name.ends_with(SEGMENT_SUFFIX)
}

/// Best-effort fsync of a directory so renames inside it are durable
pub(crate) fn sync_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        std::fs::File::open(dir)?.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}
