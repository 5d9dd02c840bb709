//! Configuration for SegKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SegKvError};
use crate::storage::record_len;

/// Main configuration for a SegKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── heap.dat         (value heap)
    ///     └── segment-N.log    (key → offset segment logs)
    pub data_dir: PathBuf,

    /// Record bytes after which the active segment is rotated
    pub segment_size_limit: u64,

    /// Sync strategy: how often to fsync the heap and active segment
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Max number of resolved values kept in memory (0 disables the cache)
    pub cache_capacity: usize,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// How often the background compactor wakes up
    pub compaction_interval: Duration,

    /// Compaction runs when the segment count exceeds this value
    pub compaction_trigger: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

/// Sync strategy for heap and segment appends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync heap then segment after every write (safest, slowest)
    EveryWrite,

    /// fsync after N writes; in between, data is flushed to the OS only.
    /// A crash can lose up to N acknowledged writes; recovery drops any
    /// record whose value did not reach the heap.
    EveryNWrites { count: usize },
}

/// Default rotation threshold: five records of a 16-byte key
pub const DEFAULT_SEGMENT_SIZE_LIMIT: u64 = 5 * record_len(16);

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./segkv_data"),
            segment_size_limit: DEFAULT_SEGMENT_SIZE_LIMIT,
            sync_strategy: SyncStrategy::EveryWrite,
            cache_capacity: 1024,
            compaction_interval: Duration::from_secs(60),
            compaction_trigger: 2,
            listen_addr: "127.0.0.1:4000".to_string(),
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the storage core cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.segment_size_limit == 0 {
            return Err(SegKvError::Config(
                "segment_size_limit must be greater than zero".to_string(),
            ));
        }
        if self.compaction_interval.is_zero() {
            return Err(SegKvError::Config(
                "compaction_interval must be greater than zero".to_string(),
            ));
        }
        if let SyncStrategy::EveryNWrites { count: 0 } = self.sync_strategy {
            return Err(SegKvError::Config(
                "sync count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the rotation threshold in bytes
    pub fn segment_size_limit(mut self, bytes: u64) -> Self {
        self.config.segment_size_limit = bytes;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the cache capacity (number of entries)
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Set the background compaction interval
    pub fn compaction_interval(mut self, interval: Duration) -> Self {
        self.config.compaction_interval = interval;
        self
    }

    /// Set the segment count above which compaction runs
    pub fn compaction_trigger(mut self, segments: usize) -> Self {
        self.config.compaction_trigger = segments;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
