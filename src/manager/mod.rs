//! Segment Manager
//!
//! The storage engine proper: owns the heap, the segment logs, the registry
//! and the cache, and is the only thing the network layer talks to.
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                              |
//! |----------------|------------------------------------------------------|
//! | `mod.rs`       | `SegmentManager`, `open()`, accessors                 |
//! | [`recovery`]   | finish interrupted compactions, tmp cleanup, load state |
//! | [`write`]      | `write()`, validation, rotation                       |
//! | [`read`]       | `read()`, newest-wins segment scan                    |
//! | [`compaction`] | `compact()` / `maybe_compact()`                       |
//! | [`compactor`]  | background thread running `maybe_compact()` on a timer |
//!
//! ## Data Flow
//!
//! ```text
//! write: heap.append ──▶ active segment.append_record ──▶ (rotate?) ──▶ cache
//! read:  cache ──miss──▶ scan segments (oldest → newest, last wins)
//!              ──▶ heap.resolve ──▶ cache ──▶ caller
//! ```

mod compaction;
mod compactor;
mod read;
mod recovery;
mod write;

pub use compaction::CompactionStats;
pub use compactor::CompactorHandle;

use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::cache::{CacheStats, LruCache};
use crate::config::{Config, SyncStrategy};
use crate::error::Result;
use crate::storage::{Heap, Segment, SegmentRegistry, SegmentWriter};

/// Merged log is written here before it is committed
pub const COMPACT_TMP_FILENAME: &str = "compact.tmp";

/// Present only between a compaction's commit point and the end of its swap
pub const COMPACT_PENDING_FILENAME: &str = "compact.pending";

/// Everything guarded by the manager's lock
pub(crate) struct State {
    pub(crate) registry: SegmentRegistry,
    pub(crate) heap: Heap,
    /// Append handle on the last segment in `registry`
    pub(crate) active: SegmentWriter,
    /// Writes since the last fsync (for `SyncStrategy::EveryNWrites`)
    pub(crate) writes_since_sync: usize,
    /// Only locked while `State`'s own lock is held
    pub(crate) cache: Mutex<LruCache>,
    /// A compaction committed but could not finish its file swap; reads
    /// and writes must finish it before touching the segments
    pub(crate) swap_pending: bool,
}

impl State {
    /// Count a write and report whether this one must be fsynced
    fn should_sync(&mut self, strategy: SyncStrategy) -> bool {
        self.writes_since_sync += 1;
        match strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNWrites { count } => {
                if self.writes_since_sync >= count {
                    self.writes_since_sync = 0;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// The storage engine
///
/// ## Concurrency Model
///
/// A single `RwLock<State>`:
/// - **`write`**, rotation and compaction take it exclusively. A compaction
///   pass holds it from the first scan to the final swap, so nothing can
///   observe a half-replaced heap or a segment that is being deleted.
/// - **`read`** takes it shared; many reads scan segments in parallel. The
///   cache is a `Mutex` inside the state, locked briefly under the shared
///   lock. Since writers are excluded for the whole read, a value put in
///   the cache by a read can never be stale.
///
/// Construct once with [`SegmentManager::open`] and share it as
/// `Arc<SegmentManager>`.
pub struct SegmentManager {
    config: Config,
    data_dir: PathBuf,
    state: RwLock<State>,
}

impl SegmentManager {
    /// Open or create a store in `config.data_dir`
    ///
    /// On startup:
    /// 1. Create the data directory if it doesn't exist
    /// 2. Finish a compaction that crashed after its commit point
    /// 3. Remove leftover temporary files
    /// 4. Open (or create) the heap
    /// 5. Rebuild the registry from segment files, repairing the active
    ///    segment's tail; create segment 0 if there are none
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        let data_dir = config.data_dir.clone();
        let state = recovery::load_state(&data_dir, config.cache_capacity)?;

        tracing::info!(
            "Opened store at {}: {} segment(s), heap {} bytes",
            data_dir.display(),
            state.registry.len(),
            state.heap.len()
        );

        Ok(Self {
            config,
            data_dir,
            state: RwLock::new(state),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// fsync the heap and the active segment
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.write();
        self.finish_pending_swap(&mut state)?;
        state.heap.sync()?;
        state.active.sync()?;
        state.writes_since_sync = 0;
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live segments
    pub fn segment_count(&self) -> usize {
        self.state.read().registry.len()
    }

    /// Snapshot of the registry, oldest first
    pub fn segments(&self) -> Vec<Segment> {
        self.state.read().registry.segments().to_vec()
    }

    /// The segment currently receiving writes
    pub fn active_segment(&self) -> Option<Segment> {
        self.state.read().registry.active().copied()
    }

    /// Heap size in bytes
    pub fn heap_len(&self) -> u64 {
        self.state.read().heap.len()
    }

    /// Number of cached values
    pub fn cache_len(&self) -> usize {
        self.state.read().cache.lock().len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.state.read().cache.lock().stats()
    }
}

impl std::fmt::Debug for SegmentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        let cache_len = state.cache.lock().len();
        f.debug_struct("SegmentManager")
            .field("data_dir", &self.data_dir)
            .field("segments", &state.registry.segments())
            .field("heap_len", &state.heap.len())
            .field("cache_len", &cache_len)
            .field("swap_pending", &state.swap_pending)
            .finish()
    }
}
