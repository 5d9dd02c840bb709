//! Value Heap
//!
//! Append-only file of length-prefixed values, addressed by byte offset.
//! Entries are never modified; superseded ones stay in place until the
//! compactor rewrites the whole heap.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::codec::{self, OFFSET_WIDTH};
use crate::error::{Result, SegKvError};

use super::MAX_VALUE_SIZE;

/// Heap file name inside the data directory
pub const HEAP_FILENAME: &str = "heap.dat";

/// Scratch file the compactor writes the next heap into
pub const HEAP_TMP_FILENAME: &str = "heap.tmp";

/// The value heap
///
/// Holds an append handle; reads open their own handle so a resolve never
/// disturbs the write position.
pub struct Heap {
    /// Path of the live heap file
    path: PathBuf,
    /// Append handle
    file: File,
    /// Current size of the heap in bytes (next append offset)
    len: u64,
}

impl Heap {
    /// Open the heap in `dir`, creating an empty one if absent
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(HEAP_FILENAME);
        let file = Self::open_append(&path)?;
        let len = file.metadata()?.len();

        tracing::debug!("Opened heap {} ({} bytes)", path.display(), len);

        Ok(Self { path, file, len })
    }

    fn open_append(path: &Path) -> std::io::Result<File> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
    }

    /// Append a value and return the offset its entry starts at
    ///
    /// The entry is written with a single `write_all` and flushed to the OS.
    /// Call [`Heap::sync`] to make it durable before referencing the offset
    /// from a segment record when the sync strategy requires it.
    pub fn append(&mut self, value: &[u8]) -> Result<u64> {
        let offset = self.len;

        let mut entry = Vec::with_capacity(OFFSET_WIDTH + value.len());
        entry.extend_from_slice(&codec::encode(value.len() as u64));
        entry.extend_from_slice(value);

        if let Err(e) = self.file.write_all(&entry).and_then(|_| self.file.flush()) {
            // Drop any partial entry so the next offset stays accurate
            if let Err(trunc) = self.file.set_len(offset) {
                tracing::warn!("Failed to roll back partial heap entry at {}: {}", offset, trunc);
            }
            return Err(e.into());
        }

        self.len += entry.len() as u64;
        Ok(offset)
    }

    /// fsync the heap file
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Read the value whose entry starts at `offset`
    ///
    /// Fails with [`SegKvError::CorruptHeap`] if the entry runs past the end
    /// of the file or declares more than `MAX_VALUE_SIZE` bytes; nothing is
    /// allocated for the declared length until it has been checked.
    pub fn resolve(&self, offset: u64) -> Result<Vec<u8>> {
        let (mut reader, declared) = self.open_entry(offset)?;
        let mut value = vec![0u8; declared as usize];
        reader.read_exact(&mut value)?;
        Ok(value)
    }

    /// Whether a complete entry starts at `offset`
    ///
    /// Only reads the length prefix. Used by recovery to spot segment
    /// records whose value never reached the disk.
    pub fn contains_entry(&self, offset: u64) -> Result<bool> {
        match self.open_entry(offset) {
            Ok(_) => Ok(true),
            Err(e) if e.is_corruption() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Validate the entry at `offset`, leaving the reader at its payload
    fn open_entry(&self, offset: u64) -> Result<(BufReader<File>, u64)> {
        let mut file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();

        let available = file_len.saturating_sub(offset);
        if available < OFFSET_WIDTH as u64 {
            return Err(SegKvError::CorruptHeap {
                offset,
                declared: OFFSET_WIDTH as u64,
                available,
            });
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(file);

        let mut len_bytes = [0u8; OFFSET_WIDTH];
        reader.read_exact(&mut len_bytes)?;
        let declared = codec::decode(len_bytes);

        let available = available - OFFSET_WIDTH as u64;
        if declared > available || declared > MAX_VALUE_SIZE as u64 {
            return Err(SegKvError::CorruptHeap {
                offset,
                declared,
                available,
            });
        }

        Ok((reader, declared))
    }

    /// Write `values` contiguously into a fresh temporary heap
    ///
    /// Returns the pending heap and the new offset of each value, in input
    /// order. The live heap is untouched until [`Heap::install`].
    pub fn rewrite<'a, I>(&self, values: I) -> Result<(HeapRewrite, Vec<u64>)>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let tmp_path = dir.join(HEAP_TMP_FILENAME);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        // Guard first so an early return removes the partial file
        let mut pending = HeapRewrite {
            tmp_path,
            len: 0,
            installed: false,
        };

        let mut writer = BufWriter::new(file);
        let mut offsets = Vec::new();

        for value in values {
            offsets.push(pending.len);
            writer.write_all(&codec::encode(value.len() as u64))?;
            writer.write_all(value)?;
            pending.len += (OFFSET_WIDTH + value.len()) as u64;
        }

        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| SegKvError::Io(e.into_error()))?;
        file.sync_all()?;

        Ok((pending, offsets))
    }

    /// Replace the live heap with a finished rewrite (rename over it)
    ///
    /// The append handle is opened on the temporary file before the rename,
    /// so once the rename succeeds nothing else can fail. On error the
    /// rewrite is left as it was and still owns its temporary file.
    pub fn install(&mut self, rewrite: &mut HeapRewrite) -> Result<()> {
        if rewrite.installed {
            return Err(SegKvError::Corruption(
                "heap rewrite was already installed".to_string(),
            ));
        }
        let file = Self::open_append(&rewrite.tmp_path)?;
        fs::rename(&rewrite.tmp_path, &self.path)?;
        rewrite.installed = true;

        self.file = file;
        self.len = rewrite.len;
        Ok(())
    }

    /// Current heap size in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A fully written heap waiting to be swapped in
///
/// Removes its temporary file when dropped without being installed.
#[derive(Debug)]
pub struct HeapRewrite {
    tmp_path: PathBuf,
    len: u64,
    installed: bool,
}

impl HeapRewrite {
    /// Size of the rewritten heap in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for HeapRewrite {
    fn drop(&mut self) {
        if !self.installed {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}
