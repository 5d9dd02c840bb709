//! Segment Log
//!
//! Append-only files of `key → heap offset` records. Records are length
//! prefixed and checksummed, so keys may hold any bytes and a torn append
//! is detected instead of being misparsed.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::codec::{self, OFFSET_WIDTH};
use crate::error::{Result, SegKvError};

use super::MAX_KEY_SIZE;

/// Magic bytes identifying a SegKV segment log
pub const MAGIC: &[u8; 4] = b"SGLG";

/// Current segment log format version
pub const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) = 6 bytes
pub const HEADER_SIZE: u64 = 6;

const CRC_WIDTH: usize = 4;

/// Encoded size of one record whose key is `key_len` bytes long
pub const fn record_len(key_len: usize) -> u64 {
    (OFFSET_WIDTH + key_len + OFFSET_WIDTH + CRC_WIDTH) as u64
}

fn encode_header() -> [u8; HEADER_SIZE as usize] {
    let mut header = [0u8; HEADER_SIZE as usize];
    header[..4].copy_from_slice(MAGIC);
    header[4..].copy_from_slice(&VERSION.to_le_bytes());
    header
}

/// Encode one record: [key_len][key][offset][crc32 of everything before]
fn encode_record(key: &[u8], offset: u64) -> Vec<u8> {
    let mut record = Vec::with_capacity(record_len(key.len()) as usize);
    record.extend_from_slice(&codec::encode(key.len() as u64));
    record.extend_from_slice(key);
    record.extend_from_slice(&codec::encode(offset));
    let crc = crc32fast::hash(&record);
    record.extend_from_slice(&crc.to_le_bytes());
    record
}

// =============================================================================
// Writer
// =============================================================================

/// Append handle on the active segment
pub struct SegmentWriter {
    path: PathBuf,
    file: File,
    /// File length including the header
    len: u64,
}

impl SegmentWriter {
    /// Create a brand-new segment file with its header synced to disk
    pub fn create(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .append(true)
            .open(path)?;

        file.write_all(&encode_header())?;
        file.sync_all()?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len: HEADER_SIZE,
        })
    }

    /// Open an existing segment for appending
    ///
    /// A zero-length file (crash right after creation) gets its header
    /// written now. Run [`repair_tail`] first so appends land after the
    /// last valid record.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).append(true).open(path)?;
        let mut len = file.metadata()?.len();

        if len == 0 {
            file.write_all(&encode_header())?;
            file.sync_all()?;
            len = HEADER_SIZE;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
        })
    }

    /// Update the path after the file has been renamed underneath the handle
    pub(crate) fn set_path(&mut self, path: &Path) {
        self.path = path.to_path_buf();
    }

    /// Append one record and return the number of bytes written
    ///
    /// On failure the file is cut back to its previous length so a torn
    /// record can never sit in front of later good ones.
    pub fn append_record(&mut self, key: &str, offset: u64) -> Result<u64> {
        let record = encode_record(key.as_bytes(), offset);

        if let Err(e) = self.file.write_all(&record).and_then(|_| self.file.flush()) {
            if let Err(trunc) = self.file.set_len(self.len) {
                tracing::warn!(
                    "Failed to roll back partial record in {}: {}",
                    self.path.display(),
                    trunc
                );
            }
            return Err(e.into());
        }

        let written = record.len() as u64;
        self.len += written;
        Ok(written)
    }

    /// fsync the segment file
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Record bytes written so far (file length minus header)
    pub fn record_bytes(&self) -> u64 {
        self.len.saturating_sub(HEADER_SIZE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write a complete segment file in one pass and fsync it
///
/// Used by compaction for the merged log. Returns the record bytes written.
pub fn write_segment_file<'a, I>(path: &Path, records: I) -> Result<u64>
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    let mut writer = BufWriter::new(file);
    writer.write_all(&encode_header())?;

    let mut written = 0u64;
    for (key, offset) in records {
        let record = encode_record(key.as_bytes(), offset);
        writer.write_all(&record)?;
        written += record.len() as u64;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| SegKvError::Io(e.into_error()))?;
    file.sync_all()?;

    Ok(written)
}

// =============================================================================
// Reader
// =============================================================================

/// Forward-only streaming scan over a segment's records
///
/// Yields `(key, offset)` in file order. The first corrupt record is
/// yielded as an error and ends the scan. To rescan, open a new reader.
pub struct SegmentReader {
    path: PathBuf,
    reader: BufReader<File>,
    /// Byte position just past the last valid record
    position: u64,
    done: bool,
}

impl SegmentReader {
    /// Open a segment and validate its header
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut header = [0u8; HEADER_SIZE as usize];
        let n = read_up_to(&mut reader, &mut header)?;

        // Empty file: created but the header never made it to disk
        if n == 0 {
            return Ok(Self {
                path: path.to_path_buf(),
                reader,
                position: 0,
                done: true,
            });
        }

        if n < header.len() || &header[..4] != MAGIC {
            return Err(SegKvError::CorruptRecord {
                segment: path.to_path_buf(),
                position: 0,
                reason: "missing or invalid segment header".to_string(),
            });
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(SegKvError::Corruption(format!(
                "unsupported segment log version {} in {}",
                version,
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            position: HEADER_SIZE,
            done: false,
        })
    }

    /// Byte position just past the last record read successfully
    pub fn position(&self) -> u64 {
        self.position
    }

    fn corrupt(&mut self, reason: String) -> Option<Result<(String, u64)>> {
        self.done = true;
        Some(Err(SegKvError::CorruptRecord {
            segment: self.path.clone(),
            position: self.position,
            reason,
        }))
    }

    fn read_record(&mut self) -> Option<Result<(String, u64)>> {
        let mut len_bytes = [0u8; OFFSET_WIDTH];
        match read_up_to(&mut self.reader, &mut len_bytes) {
            Ok(0) => {
                self.done = true;
                return None;
            }
            Ok(n) if n < OFFSET_WIDTH => {
                return self.corrupt(format!("truncated key length ({} of 8 bytes)", n));
            }
            Ok(_) => {}
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        }

        let key_len = codec::decode(len_bytes);
        if key_len > MAX_KEY_SIZE as u64 {
            return self.corrupt(format!("key length {} exceeds maximum", key_len));
        }
        let key_len = key_len as usize;

        let mut body = vec![0u8; key_len + OFFSET_WIDTH + CRC_WIDTH];
        match read_up_to(&mut self.reader, &mut body) {
            Ok(n) if n < body.len() => {
                return self.corrupt(format!(
                    "truncated record ({} of {} bytes after key length)",
                    n,
                    body.len()
                ));
            }
            Ok(_) => {}
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        }

        let crc_at = key_len + OFFSET_WIDTH;
        let stored_crc = u32::from_le_bytes([
            body[crc_at],
            body[crc_at + 1],
            body[crc_at + 2],
            body[crc_at + 3],
        ]);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&len_bytes);
        hasher.update(&body[..crc_at]);
        if hasher.finalize() != stored_crc {
            return self.corrupt("checksum mismatch".to_string());
        }

        let offset = match codec::decode_slice(&body[key_len..crc_at]) {
            Some(offset) => offset,
            None => return self.corrupt("missing offset field".to_string()),
        };

        body.truncate(key_len);
        let key = match String::from_utf8(body) {
            Ok(key) => key,
            Err(_) => return self.corrupt("key is not valid UTF-8".to_string()),
        };

        self.position += record_len(key_len);
        Some(Ok((key, offset)))
    }
}

impl Iterator for SegmentReader {
    type Item = Result<(String, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.read_record()
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Truncate a segment to the end of its last valid record
///
/// Returns the record bytes that remain. A torn or corrupt tail left by an
/// unclean shutdown is cut off so later appends stay reachable by scans.
pub fn repair_tail(path: &Path) -> Result<u64> {
    let mut reader = match SegmentReader::open(path) {
        Ok(reader) => reader,
        Err(e) if e.is_corruption() && std::fs::metadata(path)?.len() <= HEADER_SIZE => {
            // No room for a record behind a bad header; the writer rewrites it
            tracing::warn!("Discarding unreadable header of {}: {}", path.display(), e);
            truncate_segment(path, 0)?;
            return Ok(0);
        }
        Err(e) => return Err(e),
    };
    for record in reader.by_ref() {
        if let Err(e) = record {
            if !e.is_corruption() {
                return Err(e);
            }
            tracing::warn!("{}", e);
        }
    }

    let valid_len = reader.position();
    let file_len = std::fs::metadata(path)?.len();

    if valid_len < file_len {
        tracing::warn!(
            "Truncating {} from {} to {} bytes (discarding torn tail)",
            path.display(),
            file_len,
            valid_len
        );
        truncate_segment(path, valid_len)?;
    }

    Ok(valid_len.saturating_sub(HEADER_SIZE))
}

/// Cut a segment file to `len` bytes and sync it
pub fn truncate_segment(path: &Path, len: u64) -> Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    file.sync_all()?;
    Ok(())
}
